//! Security S0 framing.
//!
//! Encryption, MAC checks and nonce bookkeeping belong to the
//! [`SecurityManager`](crate::SecurityManager) supplied through the context;
//! this module only splits and assembles the encapsulation fields.

use serde::Serialize;

use crate::cc::unknown_command;
use crate::command_class::{Command, CommandClass, EncodeScope, ParseScope};
use crate::context::S0Ciphertext;
use crate::error::{CcError, Result};
use crate::ids;
use crate::payload::PayloadReader;
use crate::traits::{Encapsulated, Encapsulating};
use crate::validate_payload;

const SCHEME_GET: u8 = 0x04;
const SCHEME_REPORT: u8 = 0x05;
const NONCE_GET: u8 = 0x40;
const NONCE_REPORT: u8 = 0x80;
const COMMAND_ENCAPSULATION: u8 = 0x81;
const COMMAND_ENCAPSULATION_NONCE_GET: u8 = 0xC1;

const IV_LEN: usize = 8;
const MAC_LEN: usize = 8;
/// IV, nonce id and MAC around the ciphertext.
const FRAMING_LEN: usize = IV_LEN + 1 + MAC_LEN;

const SEQUENCED: u8 = 0x10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityCommand {
    SchemeGet {
        schemes: u8,
    },
    SchemeReport {
        schemes: u8,
    },
    NonceGet,
    NonceReport {
        nonce: [u8; 8],
    },
    CommandEncapsulation {
        /// Ask the receiver for a fresh nonce in the same frame.
        request_nonce: bool,
        encapsulated: Box<CommandClass>,
    },
}

impl SecurityCommand {
    pub fn encapsulate(cc: CommandClass) -> CommandClass {
        CommandClass {
            node: cc.node.clone(),
            endpoint: 0,
            version: 1,
            command: Command::Security(Self::CommandEncapsulation {
                request_nonce: false,
                encapsulated: Box::new(cc),
            }),
        }
    }

    pub fn command_id(&self) -> u8 {
        match self {
            Self::SchemeGet { .. } => SCHEME_GET,
            Self::SchemeReport { .. } => SCHEME_REPORT,
            Self::NonceGet => NONCE_GET,
            Self::NonceReport { .. } => NONCE_REPORT,
            Self::CommandEncapsulation {
                request_nonce: false,
                ..
            } => COMMAND_ENCAPSULATION,
            Self::CommandEncapsulation {
                request_nonce: true,
                ..
            } => COMMAND_ENCAPSULATION_NONCE_GET,
        }
    }

    pub(crate) fn parse(command: u8, body: &[u8], scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(body);
        match command {
            SCHEME_GET => Ok(Self::SchemeGet {
                schemes: reader.u8()?,
            }),
            SCHEME_REPORT => Ok(Self::SchemeReport {
                schemes: reader.u8()?,
            }),
            NONCE_GET => Ok(Self::NonceGet),
            NONCE_REPORT => Ok(Self::NonceReport {
                nonce: reader.array()?,
            }),
            COMMAND_ENCAPSULATION | COMMAND_ENCAPSULATION_NONCE_GET => {
                validate_payload!(body.len() > FRAMING_LEN);
                let iv = reader.array()?;
                let ciphertext = reader.bytes(body.len() - FRAMING_LEN)?.to_vec();
                let nonce_id = reader.u8()?;
                let mac = reader.array()?;
                let payload = S0Ciphertext {
                    iv,
                    ciphertext,
                    nonce_id,
                    mac,
                };

                let manager = scope.ctx.security_manager().ok_or_else(|| {
                    CcError::Decrypt("no security manager to decrypt with".into())
                })?;
                let plaintext = manager.decrypt(scope.node, command, &payload)?;
                let Some((&sequence, inner)) = plaintext.split_first() else {
                    return Err(CcError::Decrypt("empty plaintext".into()));
                };
                if sequence & SEQUENCED != 0 {
                    return Err(CcError::not_implemented(ids::SECURITY, Some(command)));
                }
                validate_payload!(!inner.is_empty());
                let encapsulated = scope.parse_inner(inner, scope.endpoint)?;
                Ok(Self::CommandEncapsulation {
                    request_nonce: command == COMMAND_ENCAPSULATION_NONCE_GET,
                    encapsulated: Box::new(encapsulated),
                })
            }
            other => Err(unknown_command(ids::SECURITY, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>, scope: &EncodeScope<'_>) -> Result<()> {
        match self {
            Self::SchemeGet { schemes } | Self::SchemeReport { schemes } => out.push(*schemes),
            Self::NonceGet => {}
            Self::NonceReport { nonce } => out.extend_from_slice(nonce),
            Self::CommandEncapsulation { encapsulated, .. } => {
                let node = scope.node.node_id().ok_or_else(|| {
                    CcError::Argument("security encapsulation needs a singlecast target".into())
                })?;
                let manager = scope.ctx.security_manager().ok_or_else(|| {
                    CcError::Argument("no security manager to encrypt with".into())
                })?;
                let mut plaintext = vec![0x00];
                plaintext.extend(CommandClass::serialize(encapsulated, scope.ctx)?);
                let sealed = manager.encrypt(node, &plaintext)?;
                out.extend_from_slice(&sealed.iv);
                out.extend_from_slice(&sealed.ciphertext);
                out.push(sealed.nonce_id);
                out.extend_from_slice(&sealed.mac);
            }
        }
        Ok(())
    }
}

impl Encapsulating for SecurityCommand {
    fn encapsulated(&self) -> Vec<&CommandClass> {
        match self {
            Self::CommandEncapsulation { encapsulated, .. } => vec![encapsulated.as_ref()],
            _ => Vec::new(),
        }
    }

    fn encapsulated_mut(&mut self) -> Encapsulated<'_, CommandClass> {
        match self {
            Self::CommandEncapsulation { encapsulated, .. } => {
                Encapsulated::One(encapsulated.as_mut())
            }
            _ => Encapsulated::None,
        }
    }

    fn extra_overhead(&self) -> usize {
        match self {
            // framing plus the sequencing byte inside the ciphertext
            Self::CommandEncapsulation { .. } => FRAMING_LEN + 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cc::basic::BasicCommand;
    use crate::cc::test_support::NODE;
    use crate::context::{NodeId, SecurityManager, StaticContext};

    /// XOR "cipher" with a checksum MAC, enough to exercise the framing.
    struct XorManager;

    const KEY: u8 = 0x5A;

    fn mac(ciphertext: &[u8]) -> [u8; 8] {
        let sum = ciphertext.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        [sum; 8]
    }

    impl SecurityManager for XorManager {
        fn decrypt(&self, _node: NodeId, _cc_command: u8, payload: &S0Ciphertext) -> Result<Vec<u8>> {
            if payload.mac != mac(&payload.ciphertext) {
                return Err(CcError::Decrypt("MAC mismatch".into()));
            }
            Ok(payload.ciphertext.iter().map(|b| b ^ KEY).collect())
        }

        fn encrypt(&self, _node: NodeId, plaintext: &[u8]) -> Result<S0Ciphertext> {
            let ciphertext: Vec<u8> = plaintext.iter().map(|b| b ^ KEY).collect();
            Ok(S0Ciphertext {
                iv: [0x11; 8],
                mac: mac(&ciphertext),
                ciphertext,
                nonce_id: 0x42,
            })
        }
    }

    fn secure_ctx() -> StaticContext {
        StaticContext::new(1).with_security(Arc::new(XorManager))
    }

    #[test]
    fn encapsulation_roundtrip() {
        let cc = SecurityCommand::encapsulate(CommandClass::new(NODE, BasicCommand::Get));
        let bytes = cc.serialize(&secure_ctx()).unwrap();
        assert_eq!(bytes.len(), 2 + FRAMING_LEN + 1 + 2);
        assert_eq!(&bytes[..2], &[0x98, 0x81]);

        let parsed = CommandClass::parse(&bytes, NODE, &secure_ctx()).unwrap();
        assert_eq!(parsed.innermost().command, Command::Basic(BasicCommand::Get));
        assert_eq!(parsed.serialize(&secure_ctx()).unwrap(), bytes);
    }

    #[test]
    fn decrypt_failure_fails_the_parse() {
        let cc = SecurityCommand::encapsulate(CommandClass::new(NODE, BasicCommand::Get));
        let mut bytes = cc.serialize(&secure_ctx()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            CommandClass::parse(&bytes, NODE, &secure_ctx()),
            Err(CcError::Decrypt(_))
        ));
    }

    #[test]
    fn missing_manager_is_decrypt_error() {
        let cc = SecurityCommand::encapsulate(CommandClass::new(NODE, BasicCommand::Get));
        let bytes = cc.serialize(&secure_ctx()).unwrap();
        assert!(matches!(
            CommandClass::parse(&bytes, NODE, &StaticContext::new(1)),
            Err(CcError::Decrypt(_))
        ));
        assert!(matches!(
            cc.serialize(&StaticContext::new(1)),
            Err(CcError::Argument(_))
        ));
    }

    #[test]
    fn short_encapsulation_is_invalid() {
        let mut bytes = vec![0x98, 0x81];
        bytes.extend_from_slice(&[0u8; FRAMING_LEN]);
        assert!(matches!(
            CommandClass::parse(&bytes, NODE, &secure_ctx()),
            Err(CcError::InvalidPayload(_))
        ));
    }

    #[test]
    fn nonce_report() {
        let cc = crate::cc::test_support::reencode(&[0x98, 0x80, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            cc.command,
            Command::Security(SecurityCommand::NonceReport {
                nonce: [1, 2, 3, 4, 5, 6, 7, 8]
            })
        );
    }
}
