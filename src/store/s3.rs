use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::OnceLock;
use url::Url;

use super::{ObjectStore, ObjectSummary};
use crate::aws::sigv4::{payload_hash, uri_encode};
use crate::aws::{AwsClient, AwsRequest};

const SERVICE: &str = "s3";

/// One page of a `ListObjectsV2` response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListObjectsPage {
    pub objects: Vec<ObjectSummary>,
    /// Present when the listing is truncated.
    pub next_token: Option<String>,
}

pub struct S3ObjectStore {
    client: AwsClient,
}

impl S3ObjectStore {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    fn locate(&self, bucket: &str, key: &str) -> Result<(Url, String)> {
        locate(
            self.client.endpoint_override(),
            self.client.region(),
            bucket,
            key,
        )
    }

    fn list_page(&self, bucket: &str, token: Option<&str>) -> Result<ListObjectsPage> {
        let (endpoint, path) = self.locate(bucket, "")?;
        let mut query = vec![("list-type".to_string(), "2".to_string())];
        if let Some(token) = token {
            query.push(("continuation-token".to_string(), token.to_string()));
        }
        let request = AwsRequest {
            service: SERVICE,
            method: "GET",
            endpoint: &endpoint,
            path,
            query,
            headers: vec![("x-amz-content-sha256".to_string(), payload_hash(b""))],
            body: b"",
        };
        let xml = self
            .client
            .send(&request)
            .with_context(|| format!("list objects in bucket {}", bucket))?
            .into_string()
            .context("read ListObjectsV2 response")?;
        parse_list_objects(&xml)
    }
}

impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn list_objects(&mut self, bucket: &str) -> Result<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_page(bucket, token.as_deref())?;
            log::debug!(
                "s3 list page: {} objects, truncated={}",
                page.objects.len(),
                page.next_token.is_some()
            );
            objects.extend(page.objects);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(objects)
    }

    fn download_object(&mut self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        let (endpoint, path) = self.locate(bucket, key)?;
        let request = AwsRequest {
            service: SERVICE,
            method: "GET",
            endpoint: &endpoint,
            path,
            query: Vec::new(),
            headers: vec![("x-amz-content-sha256".to_string(), payload_hash(b""))],
            body: b"",
        };
        let response = self
            .client
            .send(&request)
            .with_context(|| format!("download s3://{}/{}", bucket, key))?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create download dir {}", parent.display()))?;
        }
        let file =
            File::create(dest).with_context(|| format!("create file {}", dest.display()))?;
        let mut writer = BufWriter::new(file);
        std::io::copy(&mut response.into_reader(), &mut writer)
            .with_context(|| format!("write {}", dest.display()))?;
        writer.flush()?;
        Ok(())
    }
}

/// Endpoint and encoded path for a bucket-relative key. Virtual-hosted
/// style on AWS, path style behind an endpoint override or when the bucket
/// name has dots (the wildcard certificate covers one label only).
fn locate(
    endpoint_override: Option<&Url>,
    region: &str,
    bucket: &str,
    key: &str,
) -> Result<(Url, String)> {
    match endpoint_override {
        Some(url) => Ok((url.clone(), object_path(Some(bucket), key)?)),
        None if bucket.contains('.') => {
            let url = Url::parse(&format!("https://s3.{}.amazonaws.com", region))
                .context("build s3 endpoint")?;
            Ok((url, object_path(Some(bucket), key)?))
        }
        None => {
            let url = Url::parse(&format!("https://{}.s3.{}.amazonaws.com", bucket, region))
                .with_context(|| format!("build endpoint for bucket {}", bucket))?;
            Ok((url, object_path(None, key)?))
        }
    }
}

/// Encoded request path. `path_style_bucket` puts the bucket in the path.
///
/// Keys with `.` or `..` segments are rejected: URL parsing collapses them
/// (even percent-encoded), so the request would not match its signature.
fn object_path(path_style_bucket: Option<&str>, key: &str) -> Result<String> {
    if key.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(anyhow!(
            "object key '{}' has '.' or '..' segments and cannot be addressed",
            key
        ));
    }
    let mut path = String::from("/");
    if let Some(bucket) = path_style_bucket {
        path.push_str(&uri_encode(bucket, true));
        if key.is_empty() {
            return Ok(path);
        }
        path.push('/');
    }
    path.push_str(&uri_encode(key, false));
    Ok(path)
}

fn contents_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<Contents>(.*?)</Contents>").unwrap())
}

fn tag_value<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

/// Parses a `ListObjectsV2` XML body.
pub fn parse_list_objects(xml: &str) -> Result<ListObjectsPage> {
    if !xml.contains("<ListBucketResult") {
        return Err(anyhow!("unexpected ListObjectsV2 response"));
    }
    let mut objects = Vec::new();
    for caps in contents_re().captures_iter(xml) {
        let block = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let key = tag_value(block, "Key").ok_or_else(|| anyhow!("object entry without Key"))?;
        let size = match tag_value(block, "Size") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid Size for key {}", key))?,
            None => 0,
        };
        objects.push(ObjectSummary {
            key: unescape_xml(key),
            size,
        });
    }

    // Entries live inside <Contents>; only look for paging tags outside them.
    let outer = contents_re().replace_all(xml, "");
    let truncated = tag_value(&outer, "IsTruncated").map(str::trim) == Some("true");
    let next_token = if truncated {
        let token = tag_value(&outer, "NextContinuationToken")
            .ok_or_else(|| anyhow!("truncated listing without NextContinuationToken"))?;
        Some(unescape_xml(token))
    } else {
        None
    };
    Ok(ListObjectsPage {
        objects,
        next_token,
    })
}

fn unescape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}
