//! External API integrations

pub mod agripay;

pub use agripay::{AgriPayClient, PaymentGateway, PurchaseRequest, TopUpRequest, WalletReceipt};
