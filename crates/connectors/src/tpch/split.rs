use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::TpchError;
use super::handle::TpchTableHandle;
use super::table::TpchPart;
use crate::errors::{ConnectorError, Result};
use crate::split::SPLIT_NAME_KEY;

/// A half-open range `[offset, end)` of a tpch table's logical rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TpchConnectorSplit {
    connector_id: String,
    #[serde(default)]
    split_weight: i64,
    offset: u64,
    end: u64,
    /// Set when the range is one of the generator partitions, letting data
    /// sources start generation directly at the range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    part: Option<TpchPart>,
}

impl TpchConnectorSplit {
    pub const NAME: &'static str = "TpchConnectorSplit";

    pub fn try_new(
        connector_id: impl Into<String>,
        offset: u64,
        end: u64,
    ) -> Result<Self, TpchError> {
        if end < offset {
            return Err(TpchError::InvalidRange { offset, end });
        }
        Ok(TpchConnectorSplit {
            connector_id: connector_id.into(),
            split_weight: 0,
            offset,
            end,
            part: None,
        })
    }

    /// Range `part` of the table split into `total_parts` parts. Every part
    /// gets the same number of rows, the last part also gets the remainder.
    pub fn from_part(
        table: &TpchTableHandle,
        total_parts: u64,
        part: u64,
    ) -> Result<Self, TpchError> {
        let part = TpchPart::try_new(part, total_parts)?;
        let range = table.table().part_range(table.scale_factor(), part);
        let mut split = Self::try_new(table.connector_id(), range.start, range.end)?;
        split.part = Some(part);
        Ok(split)
    }

    /// Splits covering every row of the table exactly once.
    pub fn splits_for_table(table: &TpchTableHandle, parts: u64) -> Result<Vec<Self>, TpchError> {
        (0..parts)
            .map(|part| Self::from_part(table, parts, part))
            .collect()
    }

    pub fn with_split_weight(mut self, weight: i64) -> Self {
        self.split_weight = weight;
        self
    }

    pub fn connector_id(&self) -> &str {
        &self.connector_id
    }

    pub fn split_weight(&self) -> i64 {
        self.split_weight
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn part(&self) -> Option<TpchPart> {
        self.part
    }

    pub fn num_rows(&self) -> u64 {
        self.end - self.offset
    }

    pub fn serialize(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(obj) = &mut value {
            obj.insert(SPLIT_NAME_KEY.to_string(), Value::from(Self::NAME));
        }
        Ok(value)
    }

    pub fn create(value: &Value) -> Result<Self> {
        match value.get(SPLIT_NAME_KEY).and_then(|v| v.as_str()) {
            Some(Self::NAME) => (),
            other => {
                return Err(ConnectorError::MalformedSplit(format!(
                    "expected split name '{}', got {other:?}",
                    Self::NAME
                )));
            }
        }

        let split: TpchConnectorSplit = serde_json::from_value(value.clone())
            .map_err(|e| ConnectorError::MalformedSplit(e.to_string()))?;
        if split.end < split.offset {
            return Err(ConnectorError::MalformedSplit(format!(
                "row range [{}, {}) is inverted",
                split.offset, split.end
            )));
        }
        if let Some(part) = split.part {
            TpchPart::try_new(part.part().into(), part.total_parts().into())
                .map_err(|e| ConnectorError::MalformedSplit(e.to_string()))?;
        }

        Ok(split)
    }
}

impl fmt::Display for TpchConnectorSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tpch: [{}, {})", self.offset, self.end)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tpch::table::TpchTable;

    #[test]
    fn inverted_range() {
        let err = TpchConnectorSplit::try_new("tpch", 10, 5).unwrap_err();
        assert!(matches!(err, TpchError::InvalidRange { offset: 10, end: 5 }));
    }

    #[test]
    fn parts_cover_rows() {
        let table = TpchTableHandle::try_new("tpch", TpchTable::Nation, 1.0).unwrap();
        let splits: Vec<_> = (0..4)
            .map(|part| TpchConnectorSplit::from_part(&table, 4, part).unwrap())
            .collect();
        let ranges: Vec<_> = splits.iter().map(|s| (s.offset(), s.end())).collect();
        assert_eq!(vec![(0, 6), (6, 12), (12, 18), (18, 25)], ranges);
        assert_eq!(Some(TpchPart::try_new(2, 4).unwrap()), splits[2].part());
    }

    #[test]
    fn more_parts_than_rows() {
        let table = TpchTableHandle::try_new("tpch", TpchTable::Region, 1.0).unwrap();
        let splits = TpchConnectorSplit::splits_for_table(&table, 8).unwrap();
        let rows: u64 = splits.iter().map(|s| s.num_rows()).sum();
        assert_eq!(5, rows);
        assert_eq!(0, splits[0].num_rows());
        assert_eq!(5, splits[7].num_rows());
    }

    #[test]
    fn invalid_part() {
        let table = TpchTableHandle::try_new("tpch", TpchTable::Nation, 1.0).unwrap();
        assert!(TpchConnectorSplit::from_part(&table, 4, 4).is_err());
        assert!(TpchConnectorSplit::from_part(&table, 0, 0).is_err());
    }

    #[test]
    fn splits_for_table() {
        let table = TpchTableHandle::try_new("tpch", TpchTable::Supplier, 0.01).unwrap();
        let splits = TpchConnectorSplit::splits_for_table(&table, 3).unwrap();
        assert_eq!(3, splits.len());
        assert_eq!(0, splits[0].offset());
        assert_eq!((0, 33), (splits[0].offset(), splits[0].end()));
        assert_eq!(100, splits[2].end());
        assert!(splits.windows(2).all(|w| w[0].end() == w[1].offset()));
    }

    #[test]
    fn serialize_create_part() {
        let table = TpchTableHandle::try_new("tpch", TpchTable::Orders, 0.01).unwrap();
        let split = TpchConnectorSplit::from_part(&table, 4, 1).unwrap();
        let value = split.serialize().unwrap();
        assert_eq!(json!({"part": 1, "totalParts": 4}), value["part"]);
        assert_eq!(split, TpchConnectorSplit::create(&value).unwrap());

        let mut bad = value.clone();
        bad["part"] = json!({"part": 4, "totalParts": 4});
        let err = TpchConnectorSplit::create(&bad).unwrap_err();
        assert!(matches!(err, ConnectorError::MalformedSplit(_)));
    }

    #[test]
    fn serialize_create() {
        let split = TpchConnectorSplit::try_new("tpch", 10, 25)
            .unwrap()
            .with_split_weight(3);
        let value = split.serialize().unwrap();
        assert_eq!(
            json!({
                "name": "TpchConnectorSplit",
                "connectorId": "tpch",
                "splitWeight": 3,
                "offset": 10,
                "end": 25,
            }),
            value
        );
        assert_eq!(split, TpchConnectorSplit::create(&value).unwrap());
    }

    #[test]
    fn create_malformed() {
        let missing_end = json!({
            "name": "TpchConnectorSplit",
            "connectorId": "tpch",
            "offset": 0,
        });
        let err = TpchConnectorSplit::create(&missing_end).unwrap_err();
        assert!(matches!(err, ConnectorError::MalformedSplit(_)));

        let inverted = json!({
            "name": "TpchConnectorSplit",
            "connectorId": "tpch",
            "offset": 5,
            "end": 1,
        });
        assert!(TpchConnectorSplit::create(&inverted).is_err());

        let wrong_name = json!({
            "name": "HiveConnectorSplit",
            "connectorId": "tpch",
            "offset": 0,
            "end": 1,
        });
        assert!(TpchConnectorSplit::create(&wrong_name).is_err());
    }

    #[test]
    fn display() {
        let split = TpchConnectorSplit::try_new("tpch", 0, 10).unwrap();
        assert_eq!("Tpch: [0, 10)", split.to_string());
    }
}
