use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Bucket and decoded key of the object that triggered an upload event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadEvent {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Records", default)]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: String,
}

/// Reads the first record of an S3 notification. Further records are ignored.
pub fn parse_upload_event(payload: &[u8]) -> Result<UploadEvent> {
    let notification: Notification =
        serde_json::from_slice(payload).context("decode s3 notification")?;
    let record = notification
        .records
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("s3 notification has no records"))?;
    let key = decode_object_key(&record.s3.object.key);
    if key.is_empty() {
        return Err(anyhow!("s3 notification has an empty object key"));
    }
    if record.s3.bucket.name.is_empty() {
        return Err(anyhow!("s3 notification has an empty bucket name"));
    }
    Ok(UploadEvent {
        bucket: record.s3.bucket.name,
        key,
    })
}

/// Notification keys are form-encoded: `+` is a space and the rest is
/// percent-encoded. Literal `&` and `=` are protected so the form parser
/// yields a single name.
fn decode_object_key(raw: &str) -> String {
    let protected = raw.replace('&', "%26").replace('=', "%3D");
    url::form_urlencoded::parse(protected.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(bucket: &str, key: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "Records": [{
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": bucket, "arn": "arn:aws:s3:::trafficlabels" },
                    "object": { "key": key, "size": 1024 }
                }
            }]
        }))
        .expect("payload")
    }

    #[test]
    fn reads_first_record() {
        let event = parse_upload_event(&payload("trafficlabels", "x.jpg")).expect("event");
        assert_eq!(
            event,
            UploadEvent {
                bucket: "trafficlabels".to_string(),
                key: "x.jpg".to_string()
            }
        );
    }

    #[test]
    fn decodes_form_encoded_key() {
        let event =
            parse_upload_event(&payload("b", "cam+1/front%2Bback+%C3%A9t%C3%A9.jpg")).expect("event");
        assert_eq!(event.key, "cam 1/front+back été.jpg");
        assert_eq!(decode_object_key("a&b=c.jpg"), "a&b=c.jpg");
    }

    #[test]
    fn rejects_empty_records() {
        assert!(parse_upload_event(br#"{"Records": []}"#).is_err());
        assert!(parse_upload_event(br#"{}"#).is_err());
    }

    #[test]
    fn rejects_malformed_payload() {
        assert!(parse_upload_event(b"not json").is_err());
        assert!(parse_upload_event(br#"{"Records": [{"s3": {}}]}"#).is_err());
    }
}
