//! Builds the Type-1 and Type-3 NTLMSSP messages for a configured
//! authentication scheme, bridging `model::Credentials` to the
//! `util::crypto` hash chain and `util::ntlm` message codecs.

use rand::rngs::ThreadRng;
use rand::RngCore;

use ntlmproxy_core::error::ProxyError;
use ntlmproxy_core::ProxyResult;

use crate::model::{AuthScheme, Credentials};
use crate::util::crypto::hash::{lm_hash, lm_nt_response, nt_hash, ntlm2_session_response};
use crate::util::crypto::v2::{build_blob, lmv2_response, ntlmv2_key, ntlmv2_response};
use crate::util::ntlm::challenge::ChallengeMessage;
use crate::util::ntlm::{AuthenticateMessage, NegotiateMessage};

pub fn build_negotiate(creds: &Credentials) -> NegotiateMessage {
    let flags = creds.effective_flags(false);
    NegotiateMessage::new(flags, creds.domain.clone(), creds.workstation.clone())
}

/// Resolves the LM/NT hash pair to use, from either the operator-supplied
/// pre-computed hash or a plaintext password — already hashed into
/// `Credentials` at startup for the configured operator identity, or
/// supplied fresh per call when bridging a client's own `Basic` header.
/// Returns an error if the configured scheme needs a hash slot that was
/// never populated.
pub fn build_authenticate(
    creds: &Credentials,
    challenge: &ChallengeMessage,
    password: Option<&str>,
) -> ProxyResult<AuthenticateMessage> {
    let mut nonce = [0u8; 8];
    ThreadRng::default().fill_bytes(&mut nonce);

    let (lm_response, nt_response) = match creds.scheme {
        AuthScheme::Lm => {
            let hash = resolve_lm(creds, password)?;
            let response = lm_nt_response(&hash, &challenge.server_challenge)?;
            (response.to_vec(), Vec::new())
        }
        AuthScheme::Nt => {
            let hash = resolve_nt(creds, password)?;
            let response = lm_nt_response(&hash, &challenge.server_challenge)?;
            (Vec::new(), response.to_vec())
        }
        AuthScheme::Ntlm => {
            let lm = resolve_lm(creds, password)?;
            let nt = resolve_nt(creds, password)?;
            let lm_response = lm_nt_response(&lm, &challenge.server_challenge)?;
            let nt_response = lm_nt_response(&nt, &challenge.server_challenge)?;
            (lm_response.to_vec(), nt_response.to_vec())
        }
        AuthScheme::Ntlm2Sr => {
            let nt = resolve_nt(creds, password)?;
            let (lm_response, nt_response) =
                ntlm2_session_response(&nt, &challenge.server_challenge, &nonce)?;
            (lm_response, nt_response.to_vec())
        }
        AuthScheme::NtlmV2 => {
            let key = match creds.ntlmv2_hash {
                Some(hash) => hash,
                None => {
                    let nt = resolve_nt(creds, password)?;
                    ntlmv2_key(&nt, &creds.user, &creds.domain)?
                }
            };
            let blob = build_blob(windows_filetime_now(), &nonce, &challenge.target_info);
            let nt_response = ntlmv2_response(&key, &challenge.server_challenge, &blob)?;
            let lm_response = lmv2_response(&key, &challenge.server_challenge, &nonce)?;
            (lm_response, nt_response)
        }
        AuthScheme::Gss => {
            return Err(ProxyError::config(
                "GSS/Kerberos authentication requires an external SSPI/GSSAPI collaborator, not handled by the NTLM codec",
            ));
        }
    };

    Ok(AuthenticateMessage {
        flags: creds.effective_flags(false),
        domain: creds.domain.clone(),
        user: creds.user.clone(),
        workstation: creds.workstation.clone(),
        lm_response,
        nt_response,
        session_key: Vec::new(),
    })
}

fn resolve_lm(creds: &Credentials, password: Option<&str>) -> ProxyResult<[u8; 16]> {
    if let Some(hash) = creds.lm_hash {
        return Ok(hash);
    }
    match password {
        Some(p) => lm_hash(p),
        None => Err(ProxyError::config("LM response requested but no LM hash or password available")),
    }
}

fn resolve_nt(creds: &Credentials, password: Option<&str>) -> ProxyResult<[u8; 16]> {
    if let Some(hash) = creds.nt_hash {
        return Ok(hash);
    }
    match password {
        Some(p) => Ok(nt_hash(p)),
        None => Err(ProxyError::config("NT response requested but no NT hash or password available")),
    }
}

/// Windows FILETIME: 100ns intervals since 1601-01-01, used as the
/// NTLMv2 blob timestamp. Real clients always derive this from the
/// system clock; it only needs to be monotonic-ish, not exact.
fn windows_filetime_now() -> u64 {
    const UNIX_EPOCH_IN_FILETIME: u64 = 116_444_736_000_000_000;
    let since_unix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    UNIX_EPOCH_IN_FILETIME + since_unix.as_secs() * 10_000_000 + u64::from(since_unix.subsec_nanos() / 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ntlm::flags::NTLMFlags;

    fn sample_credentials(scheme: AuthScheme) -> Credentials {
        Credentials {
            user: "User".into(),
            domain: "Domain".into(),
            workstation: "WORKSTATION".into(),
            scheme,
            lm_hash: None,
            nt_hash: None,
            ntlmv2_hash: None,
            negotiate_flags: None,
            kerberos_available: false,
        }
    }

    fn sample_challenge() -> ChallengeMessage {
        ChallengeMessage {
            target_name: b"DOMAIN".to_vec(),
            flags: NTLMFlags::for_scheme(true, false, "Domain", ""),
            server_challenge: [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef],
            target_info: Vec::new(),
        }
    }

    #[test]
    fn ntlmv2_scheme_produces_nt_response_only() {
        let creds = sample_credentials(AuthScheme::NtlmV2);
        let msg = build_authenticate(&creds, &sample_challenge(), Some("SecREt01")).unwrap();
        assert!(msg.nt_response.len() > 24); // proof (16) + blob
        assert_eq!(msg.lm_response.len(), 24);
    }

    #[test]
    fn ntlmv2_scheme_uses_precomputed_ntlmv2_hash_without_password() {
        let mut creds = sample_credentials(AuthScheme::NtlmV2);
        creds.ntlmv2_hash = Some(ntlmv2_key(&nt_hash("SecREt01"), &creds.user, &creds.domain).unwrap());
        let msg = build_authenticate(&creds, &sample_challenge(), None).unwrap();
        assert!(msg.nt_response.len() > 24);
        assert_eq!(msg.lm_response.len(), 24);
    }

    #[test]
    fn ntlm_scheme_produces_both_responses() {
        let creds = sample_credentials(AuthScheme::Ntlm);
        let msg = build_authenticate(&creds, &sample_challenge(), Some("SecREt01")).unwrap();
        assert_eq!(msg.lm_response.len(), 24);
        assert_eq!(msg.nt_response.len(), 24);
    }

    #[test]
    fn missing_password_and_hash_is_a_config_error() {
        let creds = sample_credentials(AuthScheme::Ntlm);
        let err = build_authenticate(&creds, &sample_challenge(), None).unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)));
    }

    #[test]
    fn gss_scheme_is_not_handled_by_the_codec() {
        let creds = sample_credentials(AuthScheme::Gss);
        let err = build_authenticate(&creds, &sample_challenge(), Some("x")).unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)));
    }
}
