//! ABI bindings for the deployed ForgetlessWallet contract.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolCall, sol};
use forgetless_credentials::PasskeyCredential;

use crate::{AuthDataPayload, Submission, SubmissionKind};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IForgetlessWallet {
        /// Fields bound into a withdrawal signature.
        struct WithdrawalRequest {
            bytes credentialId;
            address token;
            uint256 amount;
            address recipient;
            uint256 nonce;
            uint256 deadline;
        }

        function DOMAIN_SEPARATOR() external view returns (bytes32);
        function WITHDRAWAL_TYPEHASH() external view returns (bytes32);
        function getNonce(bytes calldata credentialId) external view returns (uint256);
        function isUserRegistered(bytes calldata credentialId) external view returns (bool);

        /// Bind a passkey public key to its credential id.
        function register(
            bytes calldata credentialId,
            bytes32 publicKeyX,
            bytes32 publicKeyY
        ) external;

        function withdrawETH(
            WithdrawalRequest calldata request,
            bytes calldata authData
        ) external;
        function withdrawToken(
            WithdrawalRequest calldata request,
            bytes calldata authData
        ) external;
    }
}

/// A `register` transaction for `credential`.
pub fn register_submission(contract: Address, credential: &PasskeyCredential) -> Submission {
    let call = IForgetlessWallet::registerCall {
        credentialId: credential.credential_id.clone(),
        publicKeyX: credential.public_key_x(),
        publicKeyY: credential.public_key_y(),
    };
    Submission {
        to: contract,
        calldata: call.abi_encode().into(),
        kind: SubmissionKind::Register,
    }
}

/// A `withdrawETH` transaction when `request.token` is the zero address,
/// `withdrawToken` otherwise.
pub fn withdraw_submission(
    contract: Address,
    request: IForgetlessWallet::WithdrawalRequest,
    auth_data: &AuthDataPayload,
) -> Submission {
    let auth_data: Bytes = auth_data.as_bytes().clone();
    let (kind, calldata) = if request.token.is_zero() {
        (
            SubmissionKind::WithdrawEth,
            IForgetlessWallet::withdrawETHCall {
                request,
                authData: auth_data,
            }
            .abi_encode(),
        )
    } else {
        (
            SubmissionKind::WithdrawToken,
            IForgetlessWallet::withdrawTokenCall {
                request,
                authData: auth_data,
            }
            .abi_encode(),
        )
    };
    Submission {
        to: contract,
        calldata: calldata.into(),
        kind,
    }
}
