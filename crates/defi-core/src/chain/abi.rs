//! Contract bindings for every call the planners encode or decode.

use alloy::sol;

sol! {
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface IPoolAddressesProvider {
        function getPool() external view returns (address);
        function getAddress(bytes32 id) external view returns (address);
    }

    interface IAavePool {
        function supply(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
        function withdraw(address asset, uint256 amount, address to) external returns (uint256);
        function borrow(address asset, uint256 amount, uint256 interestRateMode, uint16 referralCode, address onBehalfOf) external;
        function repay(address asset, uint256 amount, uint256 interestRateMode, address onBehalfOf) external returns (uint256);
    }

    interface IRewardsController {
        function claimRewards(address[] assets, uint256 amount, address to, address reward) external returns (uint256);
    }

    struct MarketParams {
        address loanToken;
        address collateralToken;
        address oracle;
        address irm;
        uint256 lltv;
    }

    interface IMorpho {
        function supply(MarketParams marketParams, uint256 assets, uint256 shares, address onBehalf, bytes data) external returns (uint256, uint256);
        function withdraw(MarketParams marketParams, uint256 assets, uint256 shares, address onBehalf, address receiver) external returns (uint256, uint256);
        function borrow(MarketParams marketParams, uint256 assets, uint256 shares, address onBehalf, address receiver) external returns (uint256, uint256);
        function repay(MarketParams marketParams, uint256 assets, uint256 shares, address onBehalf, bytes data) external returns (uint256, uint256);
    }

    struct QuoteExactInputSingleParams {
        address tokenIn;
        address tokenOut;
        uint256 amountIn;
        uint24 fee;
        uint160 sqrtPriceLimitX96;
    }

    interface IQuoterV2 {
        function quoteExactInputSingle(QuoteExactInputSingleParams params) external returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate);
    }

    struct ExactInputSingleParams {
        address tokenIn;
        address tokenOut;
        uint24 fee;
        address recipient;
        uint256 amountIn;
        uint256 amountOutMinimum;
        uint160 sqrtPriceLimitX96;
    }

    interface ISwapRouter02 {
        function exactInputSingle(ExactInputSingleParams params) external payable returns (uint256 amountOut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use alloy::sol_types::SolCall;

    #[test]
    fn approve_selector_matches_erc20() {
        let data = IERC20::approveCall {
            spender: Address::repeat_byte(0x01),
            amount: U256::from(5u64),
        }
        .abi_encode();
        assert_eq!(&data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(data.len(), 4 + 64);

        let decoded = IERC20::approveCall::abi_decode(&data).unwrap();
        assert_eq!(decoded.amount, U256::from(5u64));
    }

    #[test]
    fn aave_supply_selector() {
        let data = IAavePool::supplyCall {
            asset: Address::ZERO,
            amount: U256::from(1u64),
            onBehalfOf: Address::ZERO,
            referralCode: 0,
        }
        .abi_encode();
        // supply(address,uint256,address,uint16)
        assert_eq!(&data[..4], &[0x61, 0x7b, 0xa0, 0x37]);
    }
}
