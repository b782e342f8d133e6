//! Registry-login payloads for `kubernetes.io/dockercfg` and
//! `kubernetes.io/dockerconfigjson` secrets.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::credentials::RegistryCredential;

const PLACEHOLDER_EMAIL: &str = "none";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretKind {
    DockerCfg,
    DockerConfigJson,
}

impl SecretKind {
    /// Secret `type` tag understood by the kubelet.
    pub fn type_tag(self) -> &'static str {
        match self {
            SecretKind::DockerCfg => "kubernetes.io/dockercfg",
            SecretKind::DockerConfigJson => "kubernetes.io/dockerconfigjson",
        }
    }

    /// The single data key holding the payload.
    pub fn data_key(self) -> &'static str {
        match self {
            SecretKind::DockerCfg => ".dockercfg",
            SecretKind::DockerConfigJson => ".dockerconfigjson",
        }
    }

    /// Render the payload for `credential`. Output is a pure function of the
    /// endpoint and token.
    pub fn payload(self, credential: &RegistryCredential) -> Vec<u8> {
        let rendered = match self {
            SecretKind::DockerCfg => {
                let cfg = BTreeMap::from([(
                    credential.endpoint.as_str(),
                    DockerCfgEntry {
                        auth: &credential.token,
                        email: PLACEHOLDER_EMAIL,
                    },
                )]);
                serde_json::to_vec(&cfg)
            }
            SecretKind::DockerConfigJson => {
                let cfg = DockerConfigJson {
                    auths: BTreeMap::from([(
                        credential.endpoint.as_str(),
                        DockerConfigJsonEntry {
                            auth: &credential.token,
                        },
                    )]),
                };
                serde_json::to_vec(&cfg)
            }
        };

        // Serializing string-keyed maps of strings cannot fail.
        rendered.unwrap_or_default()
    }
}

#[derive(Serialize)]
struct DockerCfgEntry<'a> {
    auth: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct DockerConfigJson<'a> {
    auths: BTreeMap<&'a str, DockerConfigJsonEntry<'a>>,
}

#[derive(Serialize)]
struct DockerConfigJsonEntry<'a> {
    auth: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> RegistryCredential {
        RegistryCredential {
            token: "fakeToken".to_owned(),
            endpoint: "fakeEndpoint".to_owned(),
        }
    }

    #[test]
    fn dockercfg_payload() {
        let payload = SecretKind::DockerCfg.payload(&credential());
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            r#"{"fakeEndpoint":{"auth":"fakeToken","email":"none"}}"#
        );
    }

    #[test]
    fn dockerconfigjson_payload() {
        let payload = SecretKind::DockerConfigJson.payload(&credential());
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            r#"{"auths":{"fakeEndpoint":{"auth":"fakeToken"}}}"#
        );
    }

    #[test]
    fn payload_is_reproducible() {
        let kind = SecretKind::DockerConfigJson;
        assert_eq!(kind.payload(&credential()), kind.payload(&credential()));
    }

    #[test]
    fn tags_and_keys() {
        assert_eq!(SecretKind::DockerCfg.type_tag(), "kubernetes.io/dockercfg");
        assert_eq!(SecretKind::DockerCfg.data_key(), ".dockercfg");
        assert_eq!(
            SecretKind::DockerConfigJson.type_tag(),
            "kubernetes.io/dockerconfigjson"
        );
        assert_eq!(SecretKind::DockerConfigJson.data_key(), ".dockerconfigjson");
    }
}
