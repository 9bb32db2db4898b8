//! Cross-mint swap
//!
//! Moves the value of a token issued by another mint into this wallet. The bridge is a lightning
//! invoice of this wallet's mint paid by the other mint, so this wallet only gains value once
//! the invoice is actually paid.

use cashu_wallet_common::amount;
use cashu_wallet_common::invoice::decode_invoice_amount;
use cashu_wallet_common::{ensure_cashu, Amount, Error, MintUrl, ProofsMethods, Token};
use tracing::instrument;

use super::{DynMintConnector, Wallet};

impl Wallet {
    /// Fee the token's mint charges to pay an invoice of this wallet's mint for the token value
    ///
    /// The invoice quoted for the fee is not tracked.
    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    pub async fn get_swap_fee(&self, token: &Token) -> Result<Amount, Error> {
        let untrusted = self.connector(&token.mint_url()?)?;
        self.get_swap_fee_via(token, untrusted).await
    }

    /// [`Wallet::get_swap_fee`] with the client of the token's mint given
    pub async fn get_swap_fee_via(
        &self,
        token: &Token,
        untrusted: DynMintConnector,
    ) -> Result<Amount, Error> {
        let amount = token.value()?;
        ensure_cashu!(amount > Amount::ZERO, Error::AmountZero);

        self.swap_fee(&untrusted, amount).await
    }

    /// Move the value of `token` into this wallet
    ///
    /// Tokens of this wallet's own mint are received directly. Otherwise an invoice for the token
    /// value minus the swap fee is requested here and paid by the token's mint with the token's
    /// proofs. Returns the amount the invoice was issued for, it is added to the balance once the
    /// poller confirms the payment.
    ///
    /// If redeeming or paying fails the invoice stays unpaid and this wallet gains nothing. Proofs
    /// already redeemed at the token's mint are stranded there.
    ///
    /// The token's mint is reached through the wallet's connector factory.
    pub async fn swap(&self, token: &Token) -> Result<Amount, Error> {
        let token_mint = token.mint_url()?;
        if token_mint == self.mint_url {
            return self.receive_token(token).await;
        }

        let untrusted = self.connector(&token_mint)?;
        self.swap_via(token, untrusted).await
    }

    /// [`Wallet::swap`] with the client of the token's mint given
    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    pub async fn swap_via(&self, token: &Token, untrusted: DynMintConnector) -> Result<Amount, Error> {
        let token_mint = token.mint_url()?;
        if token_mint == self.mint_url {
            return self.receive_token(token).await;
        }

        let amount = token.value()?;
        ensure_cashu!(amount > Amount::ZERO, Error::AmountZero);
        ensure_cashu!(!self.poller.is_destroyed(), Error::Shutdown);

        let fee = self.swap_fee(&untrusted, amount).await?;
        let net = match amount.checked_sub(fee) {
            Some(net) if net > Amount::ZERO => net,
            _ => {
                return Err(Error::SwapAmountTooSmall {
                    amount: amount.to_u64(),
                    fee: fee.to_u64(),
                })
            }
        };
        tracing::debug!(
            "Swapping {} from {} with fee {}",
            amount,
            token_mint,
            fee
        );

        let invoice = self.receive_lightning(net).await?;

        let proofs = untrusted.receive(token).await?;
        let redeemed = proofs.total_amount()?;
        tracing::debug!("Redeemed {} at {}", redeemed, token_mint);

        // Split off exactly what the payment needs, the mint may have changed its fee meanwhile
        let invoice_amount = decode_invoice_amount(&invoice)?;
        let fee = untrusted.get_fee(&invoice).await?;
        let required = invoice_amount
            .checked_add(fee)
            .ok_or(amount::Error::AmountOverflow)?;
        ensure_cashu!(redeemed >= required, Error::InsufficientFunds);

        let payment = if redeemed == required {
            proofs
        } else {
            let split = untrusted.send(required, proofs).await?;
            if !split.change.is_empty() {
                tracing::warn!(
                    "Leaving {} of change at {}",
                    split.change.total_amount()?,
                    token_mint
                );
            }
            split.send
        };

        untrusted.pay_invoice(&invoice, payment).await?;
        self.poller.check();

        Ok(net)
    }

    async fn swap_fee(&self, untrusted: &DynMintConnector, amount: Amount) -> Result<Amount, Error> {
        let quote = self.untracked_mint_quote(amount).await?;
        untrusted.get_fee(&quote.pr).await
    }

    fn connector(&self, mint_url: &MintUrl) -> Result<DynMintConnector, Error> {
        let factory = self.connector_factory.as_ref().ok_or(Error::Custom(
            "Connector factory required to swap".to_string(),
        ))?;
        factory(mint_url)
    }
}
