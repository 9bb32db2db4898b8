//! Fake lightning network
//!
//! Shared by every fake mint of a test so that an invoice created by one mint can be paid through
//! another. Invoices the network has never seen are treated as external and always succeed.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use cashu_wallet_common::parking_lot::Mutex;
use lightning_invoice::{Bolt11Invoice, Currency, InvoiceBuilder, PaymentSecret};
use rand::Rng;

use crate::error::Error;

/// Key every fake invoice is signed with
const NODE_SECRET: [u8; 32] = [
    0xe1, 0x26, 0xf6, 0x8f, 0x7e, 0xaf, 0xcc, 0x8b, 0x74, 0xf5, 0x4d, 0x26, 0x9f, 0xe2, 0x06, 0xbe,
    0x71, 0x50, 0x00, 0xf9, 0x4d, 0xac, 0x06, 0x7d, 0x1c, 0x04, 0xa8, 0xca, 0x3b, 0x2d, 0xb7, 0x34,
];

/// In-memory lightning network
#[derive(Debug, Default)]
pub struct FakeLightningNetwork {
    /// Payment hash to paid flag
    invoices: Mutex<HashMap<String, bool>>,
}

impl FakeLightningNetwork {
    /// Create new [`FakeLightningNetwork`]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create an invoice payable on this network
    pub fn create_invoice(&self, amount_msat: u64, description: String) -> Result<Bolt11Invoice, Error> {
        let invoice = create_fake_invoice(amount_msat, description)?;
        self.invoices
            .lock()
            .insert(invoice.payment_hash().to_string(), false);
        Ok(invoice)
    }

    /// Whether the invoice with `payment_hash` has been paid
    pub fn is_paid(&self, payment_hash: &str) -> bool {
        self.invoices
            .lock()
            .get(payment_hash)
            .copied()
            .unwrap_or(false)
    }

    /// Pay a bolt11 invoice
    pub fn pay(&self, pr: &str) -> Result<(), Error> {
        let invoice =
            Bolt11Invoice::from_str(pr).map_err(|err| Error::Invoice(err.to_string()))?;
        let payment_hash = invoice.payment_hash().to_string();

        let mut invoices = self.invoices.lock();
        match invoices.get_mut(&payment_hash) {
            Some(paid) if *paid => Err(Error::AlreadyPaid),
            Some(paid) => {
                *paid = true;
                tracing::debug!("Fake network paid invoice {}", payment_hash);
                Ok(())
            }
            None => {
                tracing::debug!("Fake network paid external invoice {}", payment_hash);
                Ok(())
            }
        }
    }
}

/// Create a signed bolt11 invoice with a random payment hash
pub fn create_fake_invoice(amount_msat: u64, description: String) -> Result<Bolt11Invoice, Error> {
    let private_key =
        SecretKey::from_slice(&NODE_SECRET).map_err(|err| Error::Invoice(err.to_string()))?;

    let random_bytes = rand::rng().random::<[u8; 32]>();
    let payment_hash = sha256::Hash::from_byte_array(random_bytes);
    let payment_secret = PaymentSecret([42u8; 32]);

    InvoiceBuilder::new(Currency::Bitcoin)
        .description(description)
        .payment_hash(payment_hash)
        .payment_secret(payment_secret)
        .amount_milli_satoshis(amount_msat)
        .current_timestamp()
        .min_final_cltv_expiry_delta(144)
        .build_signed(|hash| Secp256k1::new().sign_ecdsa_recoverable(hash, &private_key))
        .map_err(|err| Error::Invoice(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_invoice_amount() {
        let invoice = create_fake_invoice(21_000, "test".to_string()).unwrap();
        assert_eq!(invoice.amount_milli_satoshis(), Some(21_000));
    }

    #[test]
    fn test_pay_once() {
        let network = FakeLightningNetwork::new();
        let invoice = network.create_invoice(5_000, "test".to_string()).unwrap();
        let hash = invoice.payment_hash().to_string();

        assert!(!network.is_paid(&hash));
        network.pay(&invoice.to_string()).unwrap();
        assert!(network.is_paid(&hash));
        assert!(matches!(
            network.pay(&invoice.to_string()),
            Err(Error::AlreadyPaid)
        ));
    }

    #[test]
    fn test_external_invoice() {
        let network = FakeLightningNetwork::new();
        let invoice = create_fake_invoice(1_000, "external".to_string()).unwrap();

        network.pay(&invoice.to_string()).unwrap();
        assert!(!network.is_paid(&invoice.payment_hash().to_string()));
        assert!(network.pay("lnbcnotaninvoice").is_err());
    }
}
