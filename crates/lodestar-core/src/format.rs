//! Repository file content: transport encoding and artifact extraction.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lodestar_types::{Artifact, Engagement, RepositoryFile, ARTIFACT_FILE, ENGAGEMENT_FILE};

use crate::{LodestarError, Result};

pub const BASE64: &str = "base64";

/// Decoded text content of a file. Blank or absent content yields `None`.
pub fn decode_content(file: &RepositoryFile) -> Result<Option<String>> {
    let raw = match file.content.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(None),
    };

    let text = if file.encoding.as_deref() == Some(BASE64) {
        // GitLab wraps long base64 payloads
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact)
            .map_err(|e| malformed(file, e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| malformed(file, e.to_string()))?
    } else {
        raw.to_string()
    };

    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

/// Set `text` as the base64-encoded content of `file`.
pub fn encode_content(file: RepositoryFile, text: &str) -> RepositoryFile {
    file.with_content(STANDARD.encode(text.as_bytes()))
        .with_encoding(BASE64)
}

/// The artifacts carried by a repository file.
///
/// The flat artifact file is a JSON array of artifacts. The engagement file
/// embeds that array under `artifacts`, and its own `uuid` is stamped onto
/// every element as `engagementUuid`; an engagement file without a uuid is
/// malformed. Any other file yields nothing.
pub fn extract_artifacts(file: Option<&RepositoryFile>) -> Result<Vec<Artifact>> {
    let Some(file) = file else {
        return Ok(Vec::new());
    };
    let Some(text) = decode_content(file)? else {
        return Ok(Vec::new());
    };

    match file.file_name() {
        ARTIFACT_FILE => {
            serde_json::from_str::<Vec<Artifact>>(&text).map_err(|e| malformed(file, e.to_string()))
        }
        ENGAGEMENT_FILE => {
            let engagement: Engagement =
                serde_json::from_str(&text).map_err(|e| malformed(file, e.to_string()))?;
            let owner = match engagement.uuid {
                Some(uuid) if !uuid.trim().is_empty() => uuid,
                _ => return Err(malformed(file, "engagement file has no uuid".to_string())),
            };
            Ok(engagement
                .artifacts
                .into_iter()
                .map(|mut artifact| {
                    artifact.engagement_uuid = owner.clone();
                    artifact
                })
                .collect())
        }
        _ => Ok(Vec::new()),
    }
}

fn malformed(file: &RepositoryFile, reason: String) -> LodestarError {
    LodestarError::MalformedContent {
        path: file.file_path.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(path: &str, json: &str) -> RepositoryFile {
        encode_content(RepositoryFile::new(path), json)
    }

    #[test]
    fn test_absent_or_blank_file_is_empty() {
        assert!(extract_artifacts(None).unwrap().is_empty());

        let blank = RepositoryFile::new(ARTIFACT_FILE).with_content("   ");
        assert!(extract_artifacts(Some(&blank)).unwrap().is_empty());

        let whitespace_payload = encoded(ARTIFACT_FILE, "\n");
        assert!(extract_artifacts(Some(&whitespace_payload)).unwrap().is_empty());
    }

    #[test]
    fn test_flat_file_parses_array() {
        let file = encoded(
            ARTIFACT_FILE,
            r#"[{"uuid":"u1","engagementUuid":"e1","title":"Doc","description":"d","type":"link","linkAddress":"http://x","created":"2020-11-05T20:14:21.123"}]"#,
        );
        let artifacts = extract_artifacts(Some(&file)).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].uuid(), Some("u1"));
        assert_eq!(artifacts[0].engagement_uuid, "e1");
        assert!(artifacts[0].created.is_some());
    }

    #[test]
    fn test_engagement_file_stamps_owner() {
        let file = encoded(
            ENGAGEMENT_FILE,
            r#"{"uuid":"eng-1","customer_name":"Acme","artifacts":[{"title":"a","engagementUuid":"stale"},{"title":"b"}]}"#,
        );
        let artifacts = extract_artifacts(Some(&file)).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.iter().all(|a| a.engagement_uuid == "eng-1"));
    }

    #[test]
    fn test_engagement_file_without_uuid_is_malformed() {
        let missing = encoded(ENGAGEMENT_FILE, r#"{"artifacts":[{"title":"a"}]}"#);
        assert!(matches!(
            extract_artifacts(Some(&missing)),
            Err(LodestarError::MalformedContent { ref path, .. }) if path == ENGAGEMENT_FILE
        ));

        let blank = encoded(ENGAGEMENT_FILE, r#"{"uuid":"  ","artifacts":[]}"#);
        assert_eq!(extract_artifacts(Some(&blank)).unwrap_err().code(), "malformed_content");
    }

    #[test]
    fn test_nested_path_dispatches_on_file_name() {
        let file = encoded("engagement/artifacts.json", "[]");
        assert!(extract_artifacts(Some(&file)).unwrap().is_empty());

        let other = encoded("README.md", "[{\"title\":\"x\"}]");
        assert!(extract_artifacts(Some(&other)).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let file = encoded(ARTIFACT_FILE, "{not json");
        let err = extract_artifacts(Some(&file)).unwrap_err();
        assert_eq!(err.code(), "malformed_content");

        let bad_base64 = RepositoryFile::new(ARTIFACT_FILE)
            .with_content("!!!")
            .with_encoding(BASE64);
        assert!(matches!(
            extract_artifacts(Some(&bad_base64)),
            Err(LodestarError::MalformedContent { .. })
        ));
    }

    #[test]
    fn test_wrapped_base64_decodes() {
        // "W10=" is "[]"
        let file = RepositoryFile::new(ARTIFACT_FILE)
            .with_content("W1\n0=")
            .with_encoding(BASE64);
        assert_eq!(decode_content(&file).unwrap().as_deref(), Some("[]"));
        assert!(extract_artifacts(Some(&file)).unwrap().is_empty());
    }
}
