//! Registration, login and withdrawal pipelines.

use alloy_primitives::{Address, Bytes, U256, utils::ParseUnits};
use forgetless_common::{short_hex, to_hex};
use forgetless_credentials::{
    NormalizedSignature, P256PublicKey, PasskeyCredential, PasskeyManager, WebAuthnCapability,
    parse_signature, verify_assertion,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use web_time::{SystemTime, UNIX_EPOCH};

use crate::contract::{register_submission, withdraw_submission};
use crate::{
    AuthDataPayload, ChainError, ChainReader, ChainWriter, Digest, Submission, WalletConfig,
    WalletError, WithdrawalChallengeParams, build_challenge, encode_assertion,
};

/// A credential the contract recognised at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginSession {
    /// The selected passkey's credential id
    pub credential_id: Bytes,
    /// `Wallet 0x12345678...abcdef`
    pub display_name: String,
}

/// What the user wants to withdraw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalIntent {
    /// ERC-20 token, or the zero address for ETH
    pub token: Address,
    /// Amount in the token's base units
    pub amount: U256,
    /// Receiver of the funds
    pub recipient: Address,
    /// Explicit signature deadline (unix seconds); when absent the
    /// configured validity window is added to the current time
    #[serde(default)]
    pub deadline: Option<U256>,
}

impl WithdrawalIntent {
    /// Withdraw `amount` wei of ETH.
    pub fn eth(amount: U256, recipient: Address) -> Self {
        Self::token(Address::ZERO, amount, recipient)
    }

    /// Withdraw `amount` base units of `token`.
    pub fn token(token: Address, amount: U256, recipient: Address) -> Self {
        Self {
            token,
            amount,
            recipient,
            deadline: None,
        }
    }

    /// Parse a human amount such as `"1.5"` with the token's `decimals`.
    ///
    /// # Errors
    ///
    /// [`WalletError::InvalidAmount`] for negative or malformed amounts.
    pub fn parse(
        token: Address,
        amount: &str,
        decimals: u8,
        recipient: Address,
    ) -> Result<Self, WalletError> {
        let parsed = alloy_primitives::utils::parse_units(amount.trim(), decimals)
            .map_err(|e| WalletError::InvalidAmount(format!("{amount}: {e}")))?;
        match parsed {
            ParseUnits::U256(amount) => Ok(Self::token(token, amount, recipient)),
            ParseUnits::I256(_) => Err(WalletError::InvalidAmount(format!(
                "{amount}: amount must not be negative"
            ))),
        }
    }

    /// Sign with a fixed deadline instead of the validity window.
    pub fn with_deadline(mut self, deadline: U256) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A signed withdrawal ready for a [`ChainWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWithdrawal {
    /// The signed fields
    pub params: WithdrawalChallengeParams,
    /// The digest the passkey signed
    pub digest: Digest,
    /// Low-S `(r, s)`
    pub signature: NormalizedSignature,
    /// The encoded `authData` argument
    pub auth_data: AuthDataPayload,
    /// `withdrawETH` or `withdrawToken` calldata
    pub submission: Submission,
}

/// Wires passkey ceremonies to the ForgetlessWallet contract.
///
/// ```ignore
/// let wallet = Wallet::new(
///     PasskeyManager::new(BrowserAuthenticator::new()),
///     JsonRpcChainReader::new(&config)?,
///     config,
/// );
/// let (credential, submission) = wallet.register("Alice").await?;
/// writer.submit(submission).await?;
///
/// let intent = WithdrawalIntent::parse(Address::ZERO, "0.01", 18, recipient)?;
/// let receipt = wallet.withdraw(&writer, &credential.credential_id, intent).await?;
/// ```
pub struct Wallet<W, R> {
    passkeys: PasskeyManager<W>,
    reader: R,
    config: WalletConfig,
}

impl<W, R> Wallet<W, R>
where
    W: WebAuthnCapability,
    R: ChainReader,
{
    /// Create a wallet.
    pub fn new(passkeys: PasskeyManager<W>, reader: R, config: WalletConfig) -> Self {
        Self {
            passkeys,
            reader,
            config,
        }
    }

    /// The contract and network settings.
    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// The passkey manager.
    pub fn passkeys(&self) -> &PasskeyManager<W> {
        &self.passkeys
    }

    /// The chain reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Create a passkey and the `register` call binding it to the contract.
    ///
    /// Nothing is sent: the caller submits the returned [`Submission`].
    #[instrument(skip(self))]
    pub async fn register(
        &self,
        display_name: &str,
    ) -> Result<(PasskeyCredential, Submission), WalletError> {
        let credential = self.passkeys.create_credential(display_name).await?;
        let submission = register_submission(self.config.contract, &credential);
        info!(
            credential_id = %short_hex(&credential.credential_id),
            contract = %self.config.contract,
            "prepared registration"
        );
        Ok((credential, submission))
    }

    /// Let the user pick a passkey and check the contract knows it.
    ///
    /// # Errors
    ///
    /// [`ChainError::NotRegistered`] when the selected credential was never
    /// registered.
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<LoginSession, WalletError> {
        let credential_id = self.passkeys.discover_credential().await?;

        if !self.reader.is_registered(&credential_id).await? {
            return Err(ChainError::NotRegistered(short_hex(&credential_id)).into());
        }

        let display_name = wallet_display_name(&credential_id);
        info!(credential_id = %short_hex(&credential_id), "logged in");
        Ok(LoginSession {
            credential_id,
            display_name,
        })
    }

    /// Sign a withdrawal with the passkey `credential_id`.
    ///
    /// Reads the domain separator, typehash and nonce from the contract,
    /// builds the EIP-712 digest, has the passkey sign it and encodes the
    /// low-S signature into the `authData` payload.
    #[instrument(
        skip(self, credential_id, intent),
        fields(credential_id = %short_hex(credential_id))
    )]
    pub async fn prepare_withdrawal(
        &self,
        credential_id: &Bytes,
        intent: WithdrawalIntent,
    ) -> Result<PreparedWithdrawal, WalletError> {
        self.prepare(credential_id, None, intent).await
    }

    /// [`Wallet::prepare_withdrawal`], additionally checking the assertion
    /// against the credential's public key before returning it.
    #[instrument(
        skip(self, credential, intent),
        fields(credential_id = %short_hex(&credential.credential_id))
    )]
    pub async fn prepare_verified_withdrawal(
        &self,
        credential: &PasskeyCredential,
        intent: WithdrawalIntent,
    ) -> Result<PreparedWithdrawal, WalletError> {
        self.prepare(&credential.credential_id, Some(&credential.public_key), intent)
            .await
    }

    /// Prepare a withdrawal and hand it to `writer`.
    pub async fn withdraw<C>(
        &self,
        writer: &C,
        credential_id: &Bytes,
        intent: WithdrawalIntent,
    ) -> Result<C::Receipt, WalletError>
    where
        C: ChainWriter,
    {
        let prepared = self.prepare_withdrawal(credential_id, intent).await?;
        Ok(writer.submit(prepared.submission).await?)
    }

    async fn prepare(
        &self,
        credential_id: &Bytes,
        public_key: Option<&P256PublicKey>,
        intent: WithdrawalIntent,
    ) -> Result<PreparedWithdrawal, WalletError> {
        let domain_separator = self.reader.domain_separator().await?;
        let typehash = self.reader.withdrawal_typehash().await?;
        let nonce = self.reader.current_nonce(credential_id).await?;

        let deadline = match intent.deadline {
            Some(deadline) => deadline,
            None => U256::from(unix_now()?.saturating_add(self.config.withdrawal_validity)),
        };

        let params = WithdrawalChallengeParams {
            credential_id: credential_id.clone(),
            token: intent.token,
            amount: intent.amount,
            recipient: intent.recipient,
            nonce,
            deadline,
        };
        let digest = build_challenge(&params, domain_separator, typehash);
        debug!(%digest, %nonce, %deadline, "built withdrawal challenge");

        let raw = self.passkeys.sign_digest(credential_id, digest).await?;
        let signature = parse_signature(&raw.signature)?;

        if let Some(public_key) = public_key {
            verify_assertion(public_key, digest, &raw, &signature)?;
        }

        let auth_data = encode_assertion(&raw, &signature);
        let submission = withdraw_submission(self.config.contract, params.to_request(), &auth_data);

        info!(
            kind = ?submission.kind,
            token = %params.token,
            amount = %params.amount,
            recipient = %params.recipient,
            "prepared withdrawal"
        );

        Ok(PreparedWithdrawal {
            params,
            digest,
            signature,
            auth_data,
            submission,
        })
    }
}

/// `Wallet 0x` followed by the first four bytes and last three bytes of the
/// credential id in hex.
fn wallet_display_name(credential_id: &[u8]) -> String {
    let hex = to_hex(credential_id);
    if hex.len() <= 16 {
        return format!("Wallet {hex}");
    }
    format!("Wallet {}...{}", &hex[..10], &hex[hex.len() - 6..])
}

fn unix_now() -> Result<u64, WalletError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|e| WalletError::Clock(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryChain, SubmissionKind};
    use alloy_primitives::{B256, address};
    use forgetless_credentials::software::{Behavior, SoftwareAuthenticator};
    use forgetless_credentials::{AssertionError, PasskeyError};
    use p256::ecdsa::SigningKey;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    const RECIPIENT: Address = address!("00000000000000000000000000000000000000aa");

    fn wallet(
        authenticator: SoftwareAuthenticator,
    ) -> Wallet<SoftwareAuthenticator, InMemoryChain> {
        let config = WalletConfig::default();
        let chain = InMemoryChain::new(
            config.contract,
            B256::repeat_byte(0xdd),
            B256::repeat_byte(0x77),
        );
        Wallet::new(PasskeyManager::new(authenticator), chain, config)
    }

    fn authenticator(seed: u8) -> SoftwareAuthenticator {
        let signing_key = SigningKey::from_bytes(&[seed; 32].into()).unwrap();
        SoftwareAuthenticator::new(signing_key, vec![seed; 20])
    }

    #[test]
    fn it_formats_the_login_display_name() {
        let id = [
            0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x00, 0xab, 0xcd, 0xef,
        ];
        assert_eq!(wallet_display_name(&id), "Wallet 0x12345678...abcdef");
        assert_eq!(wallet_display_name(&[0xaa, 0xbb]), "Wallet 0xaabb");
    }

    #[test]
    fn it_parses_human_amounts() -> TestResult {
        let intent = WithdrawalIntent::parse(Address::ZERO, "1.5", 6, RECIPIENT)?;
        assert_eq!(intent.amount, U256::from(1_500_000u64));

        let intent = WithdrawalIntent::parse(Address::ZERO, "0.01", 18, RECIPIENT)?;
        assert_eq!(intent.amount, U256::from(10_000_000_000_000_000u64));
        Ok(())
    }

    #[test]
    fn it_rejects_bad_amounts() {
        for amount in ["-1", "abc", ""] {
            assert!(
                matches!(
                    WithdrawalIntent::parse(Address::ZERO, amount, 6, RECIPIENT),
                    Err(WalletError::InvalidAmount(_))
                ),
                "{amount}"
            );
        }
    }

    #[test_log::test(tokio::test)]
    async fn it_refuses_login_for_an_unregistered_passkey() {
        let wallet = wallet(authenticator(1));
        assert!(matches!(
            wallet.login().await,
            Err(WalletError::Chain(ChainError::NotRegistered(_)))
        ));
    }

    #[test_log::test(tokio::test)]
    async fn it_logs_in_after_registration() -> TestResult {
        let wallet = wallet(authenticator(2));
        let (credential, submission) = wallet.register("Alice").await?;
        assert_eq!(submission.kind, SubmissionKind::Register);
        wallet.reader().submit(submission).await?;

        let session = wallet.login().await?;
        assert_eq!(session.credential_id, credential.credential_id);
        assert_eq!(session.display_name, "Wallet 0x02020202...020202");
        assert_eq!(
            wallet.reader().public_key(&credential.credential_id),
            Some(credential.public_key)
        );
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn it_derives_the_deadline_from_the_validity_window() -> TestResult {
        let wallet = wallet(authenticator(3));
        let (credential, _) = wallet.register("Bob").await?;

        let before = unix_now()?;
        let prepared = wallet
            .prepare_verified_withdrawal(
                &credential,
                WithdrawalIntent::eth(U256::from(1u64), RECIPIENT),
            )
            .await?;
        let after = unix_now()?;

        assert!(prepared.params.deadline >= U256::from(before + 3600));
        assert!(prepared.params.deadline <= U256::from(after + 3600));
        assert_eq!(prepared.submission.kind, SubmissionKind::WithdrawEth);
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn it_surfaces_a_declined_signature() -> TestResult {
        let wallet = wallet(authenticator(4).with_behavior(Behavior::Decline));
        let error = wallet
            .prepare_withdrawal(
                &Bytes::from(vec![4u8; 20]),
                WithdrawalIntent::eth(U256::from(1u64), RECIPIENT),
            )
            .await
            .err()
            .ok_or("expected an error")?;

        assert!(matches!(
            error,
            WalletError::Passkey(PasskeyError::NoCredentialSelected(_))
        ));
        assert!(error.is_user_recoverable());
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn it_rejects_an_assertion_for_the_wrong_key() -> TestResult {
        let wallet = wallet(authenticator(5));
        let (mut credential, _) = wallet.register("Carol").await?;
        credential.public_key = authenticator(6).public_key();

        let result = wallet
            .prepare_verified_withdrawal(
                &credential,
                WithdrawalIntent::eth(U256::from(1u64), RECIPIENT),
            )
            .await;
        assert!(matches!(
            result,
            Err(WalletError::Assertion(AssertionError::InvalidSignature(_)))
        ));
        Ok(())
    }
}
