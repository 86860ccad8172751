use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::{LabelRecord, LabelTable};
use crate::aws::AwsClient;

const SERVICE: &str = "dynamodb";
const JSON_VERSION: &str = "1.0";
const PUT_ITEM_TARGET: &str = "DynamoDB_20120810.PutItem";

/// DynamoDB table with partition key `ImageName` and sort key `LabelName`.
pub struct DynamoLabelTable {
    client: AwsClient,
    table_name: String,
}

impl DynamoLabelTable {
    pub fn new(client: AwsClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

/// `PutItem` body. DynamoDB numbers travel as strings.
pub fn put_item_request(table_name: &str, record: &LabelRecord) -> Value {
    json!({
        "TableName": table_name,
        "Item": {
            "ImageName": { "S": record.image_name },
            "LabelName": { "S": record.label_name },
            "Confidence": { "N": record.confidence.to_string() },
        }
    })
}

impl LabelTable for DynamoLabelTable {
    fn name(&self) -> &'static str {
        "dynamodb"
    }

    fn put_label(&mut self, record: &LabelRecord) -> Result<()> {
        let payload = put_item_request(&self.table_name, record);
        let _: Value = self
            .client
            .call_json(SERVICE, JSON_VERSION, PUT_ITEM_TARGET, &payload)
            .with_context(|| {
                format!(
                    "put {}/{} into {}",
                    record.image_name, record.label_name, self.table_name
                )
            })?;
        Ok(())
    }
}
