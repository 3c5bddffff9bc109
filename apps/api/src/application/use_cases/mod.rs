pub mod billing_webhook;
