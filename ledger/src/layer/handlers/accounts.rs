use super::super::*;

impl<'a, S: State> Layer<'a, S> {
    /// Credits `amount` to `account`, minting spendable balance.
    ///
    /// This is the only operation that creates balance out of thin air.
    /// Everything else moves existing balance between accounts and escrow.
    pub async fn fund(&mut self, account: &PublicKey, amount: u64) -> Result<(), EscrowError> {
        self.credit(account, amount).await?;
        self.notify(Notification::Funded {
            account: account.clone(),
            amount,
        });
        Ok(())
    }
}
