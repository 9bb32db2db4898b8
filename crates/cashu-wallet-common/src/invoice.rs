//! Lightning invoice helpers

use std::str::FromStr;

use lightning_invoice::Bolt11Invoice;

use crate::{Amount, Error};

/// Amount of a bolt11 invoice in whole units
///
/// Invoices without an amount cannot be paid from ecash and are rejected.
pub fn decode_invoice_amount(invoice: &str) -> Result<Amount, Error> {
    let invoice = Bolt11Invoice::from_str(invoice.trim())?;
    let amount_msat = invoice
        .amount_milli_satoshis()
        .ok_or(Error::InvoiceAmountUndefined)?;

    Ok(msat_to_amount(amount_msat))
}

/// Whole units needed to cover `amount_msat`, a sub unit remainder rounds up
pub fn msat_to_amount(amount_msat: u64) -> Amount {
    Amount::from(amount_msat.div_ceil(1000))
}

/// Payment hash of a bolt11 invoice as lowercase hex
pub fn decode_payment_hash(invoice: &str) -> Result<String, Error> {
    let invoice = Bolt11Invoice::from_str(invoice.trim())?;
    Ok(invoice.payment_hash().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_amount() {
        let invoice = "lnbc330n1p5d85skpp5344v3ktclujsjl3h09wgsfm7zytumr7h7zhrl857f5w8nv0a52zqdqqcqzzsxqyz5vqrzjqvueefmrckfdwyyu39m0lf24sqzcr9vcrmxrvgfn6empxz7phrjxvrttncqq0lcqqyqqqqlgqqqqqqgq2qsp5j3rrg8kvpemqxtf86j8tjm90wq77c7ende4e5qmrerq4xsg02vhq9qxpqysgqjltywgyk6uc5qcgwh8xnzmawl2tjlhz8d28tgp3yx8xwtz76x0jqkfh6mmq70hervjxs0keun7ur0spldgll29l0dnz3md50d65sfqqqwrwpsu";
        let amount = decode_invoice_amount(invoice).unwrap();
        assert_eq!(amount, Amount::from(33));

        let hash = decode_payment_hash(invoice).unwrap();
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_msat_rounds_up() {
        assert_eq!(msat_to_amount(0), Amount::ZERO);
        assert_eq!(msat_to_amount(1), Amount::from(1));
        assert_eq!(msat_to_amount(2_000), Amount::from(2));
        assert_eq!(msat_to_amount(2_001), Amount::from(3));
        assert_eq!(msat_to_amount(u64::MAX), Amount::from(u64::MAX / 1000 + 1));
    }

    #[test]
    fn test_invalid_invoice() {
        assert!(matches!(
            decode_invoice_amount("lnbc-not-an-invoice"),
            Err(Error::Invoice(_))
        ));
        assert!(decode_payment_hash("").is_err());
    }
}
