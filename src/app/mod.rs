pub mod checkout_service;

pub use checkout_service::{
    parse_buyer, CheckoutRequest, CheckoutResponse, CheckoutService, FULLY_SIGNED_MESSAGE,
};
