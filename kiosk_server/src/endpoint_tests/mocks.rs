use async_trait::async_trait;
use deposit_engine::{BalanceSource, BalanceSourceError};
use kiosk_common::Won;
use mockall::mock;

mock! {
    pub Brokerage {}
    #[async_trait]
    impl BalanceSource for Brokerage {
        async fn fetch_balance(&self) -> Result<Won, BalanceSourceError>;
    }
}
