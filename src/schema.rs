//! Column mapping from raw spreadsheet headers to canonical routing fields.
//!
//! A [`SchemaSpec`] lists, for every canonical field, the flattened header
//! strings that may carry it. Resolution picks the first candidate present in
//! the table (exact equality only), reports every required field left
//! unmatched, and turns each data row into a typed [`FlowRow`].

use crate::cell::CellValue;
use crate::error::{FlowError, Result};
use crate::spreadsheet::RawTable;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Next-hop priority ranks, in the order they are processed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Primary,
    Secondary,
    Tertiary,
    Quaternary,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Primary,
        Priority::Secondary,
        Priority::Tertiary,
        Priority::Quaternary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Priority::Primary => "Primary",
            Priority::Secondary => "Secondary",
            Priority::Tertiary => "Tertiary",
            Priority::Quaternary => "Quaternary",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Schema-independent name of a routing table column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CanonicalField {
    Source,
    Destination,
    Overlay,
    /// Underlay slot, numbered from 1
    Underlay(usize),
    Policy,
    Criteria,
    ForwardingProfile,
    NextHop(Priority),
    TransportPrimary,
    TransportSecondary,
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalField::Source => write!(f, "source"),
            CanonicalField::Destination => write!(f, "destination"),
            CanonicalField::Overlay => write!(f, "overlay"),
            CanonicalField::Underlay(slot) => write!(f, "underlay_{}", slot),
            CanonicalField::Policy => write!(f, "policy"),
            CanonicalField::Criteria => write!(f, "criteria"),
            CanonicalField::ForwardingProfile => write!(f, "forwarding_profile"),
            CanonicalField::NextHop(p) => {
                write!(f, "next_hop_{}", p.name().to_lowercase())
            }
            CanonicalField::TransportPrimary => write!(f, "transport_primary"),
            CanonicalField::TransportSecondary => write!(f, "transport_secondary"),
        }
    }
}

impl FromStr for CanonicalField {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        let field = match s {
            "source" => CanonicalField::Source,
            "destination" => CanonicalField::Destination,
            "overlay" => CanonicalField::Overlay,
            "underlay" => CanonicalField::Underlay(1),
            "policy" => CanonicalField::Policy,
            "criteria" => CanonicalField::Criteria,
            "forwarding_profile" => CanonicalField::ForwardingProfile,
            "next_hop_primary" => CanonicalField::NextHop(Priority::Primary),
            "next_hop_secondary" => CanonicalField::NextHop(Priority::Secondary),
            "next_hop_tertiary" => CanonicalField::NextHop(Priority::Tertiary),
            "next_hop_quaternary" => CanonicalField::NextHop(Priority::Quaternary),
            "transport_primary" => CanonicalField::TransportPrimary,
            "transport_secondary" => CanonicalField::TransportSecondary,
            other => match other
                .strip_prefix("underlay_")
                .and_then(|n| n.parse::<usize>().ok())
            {
                Some(slot) if slot >= 1 => CanonicalField::Underlay(slot),
                _ => {
                    return Err(FlowError::InvalidSchema {
                        message: format!("unknown canonical field '{}'", other),
                    });
                }
            },
        };
        Ok(field)
    }
}

impl TryFrom<String> for CanonicalField {
    type Error = FlowError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CanonicalField> for String {
    fn from(value: CanonicalField) -> Self {
        value.to_string()
    }
}

/// Where to find one canonical field in a raw table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: CanonicalField,
    /// Flattened header strings, tried in order
    pub candidates: Vec<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

fn default_header_rows() -> usize {
    1
}

/// A complete column-mapping convention
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub name: String,
    /// Number of stacked header rows the layout uses
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
    /// Materialize the destination as its own node in the graph
    #[serde(default)]
    pub destination_node: bool,
    pub fields: Vec<FieldSpec>,
}

/// Names accepted by [`SchemaSpec::preset`]
pub const PRESET_NAMES: [&str; 3] = ["dual-underlay", "single-underlay", "destination-node"];

fn field(field: CanonicalField, candidates: &[&str], required: bool) -> FieldSpec {
    FieldSpec {
        field,
        candidates: candidates.iter().map(|c| c.to_string()).collect(),
        required,
    }
}

impl SchemaSpec {
    /// Two header rows, two underlay circuits per overlay
    pub fn dual_underlay() -> Self {
        use CanonicalField::*;
        SchemaSpec {
            name: "dual-underlay".to_string(),
            header_rows: 2,
            destination_node: false,
            fields: vec![
                field(Overlay, &["Overlay_ID_Unnamed:_3_level_1"], true),
                field(Underlay(1), &["Underlay-1_CID_Unnamed:_4_level_1"], true),
                field(Underlay(2), &["Underlay-2_CID_Unnamed:_5_level_1"], true),
                field(Source, &["Applications_Source"], true),
                field(Destination, &["Applications_Destination"], true),
                field(Policy, &["SDWAN_policy_Unnamed:_11_level_1"], true),
                field(ForwardingProfile, &["Forwaridng_Profile_Unnamed:_12_level_1"], true),
                field(Criteria, &["Citeria_Unnamed:_20_level_1"], true),
                field(NextHop(Priority::Primary), &["Next_Hop_Primary"], true),
                field(NextHop(Priority::Secondary), &["Next_Hop_Secondary"], true),
                field(NextHop(Priority::Tertiary), &["Next_Hop_Turtary"], true),
                field(NextHop(Priority::Quaternary), &["Next_Hop_Quaternary"], true),
                field(TransportPrimary, &["Transport_Primary"], false),
                field(TransportSecondary, &["Transport_Secondary"], false),
            ],
        }
    }

    /// One header row, one underlay circuit per overlay
    pub fn single_underlay() -> Self {
        use CanonicalField::*;
        SchemaSpec {
            name: "single-underlay".to_string(),
            header_rows: 1,
            destination_node: false,
            fields: vec![
                field(Overlay, &["Overlay_ID", "Overlay"], true),
                field(Underlay(1), &["Underlay_CID", "Underlay", "Underlay_ID"], true),
                field(Source, &["Source", "Source_Application"], true),
                field(Destination, &["Destination", "Destination_Application"], true),
                field(Policy, &["SDWAN_policy", "SDWAN_Policy", "SD-WAN_Policy"], false),
                field(Criteria, &["Criteria"], false),
                field(ForwardingProfile, &["Forwarding_Profile"], false),
                field(NextHop(Priority::Primary), &["Next_Hop_Primary"], true),
                field(NextHop(Priority::Secondary), &["Next_Hop_Secondary"], false),
                field(NextHop(Priority::Tertiary), &["Next_Hop_Tertiary"], false),
                field(NextHop(Priority::Quaternary), &["Next_Hop_Quaternary"], false),
                field(TransportPrimary, &["Transport_Primary"], false),
                field(TransportSecondary, &["Transport_Secondary"], false),
            ],
        }
    }

    /// Single-underlay layout that also draws the destination application
    pub fn destination_node() -> Self {
        SchemaSpec {
            name: "destination-node".to_string(),
            destination_node: true,
            ..Self::single_underlay()
        }
    }

    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "dual-underlay" => Ok(Self::dual_underlay()),
            "single-underlay" => Ok(Self::single_underlay()),
            "destination-node" => Ok(Self::destination_node()),
            other => Err(FlowError::UnknownSchema {
                name: other.to_string(),
            }),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let schema: SchemaSpec = serde_json::from_str(text)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// A preset name, or a path to a `.json` schema file
    pub fn load(name_or_path: &str) -> Result<Self> {
        if name_or_path.to_lowercase().ends_with(".json") {
            Self::from_json_file(name_or_path)
        } else {
            Self::preset(name_or_path)
        }
    }

    /// Number of underlay slots the schema declares
    pub fn underlay_slots(&self) -> usize {
        self.fields
            .iter()
            .filter_map(|f| match f.field {
                CanonicalField::Underlay(slot) => Some(slot),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(FlowError::InvalidSchema { message });

        for required in [CanonicalField::Overlay, CanonicalField::Destination] {
            if !self.fields.iter().any(|f| f.field == required) {
                return invalid(format!("schema '{}' has no {} field", self.name, required));
            }
        }
        for (i, spec) in self.fields.iter().enumerate() {
            if spec.candidates.is_empty() {
                return invalid(format!("field {} has no header candidates", spec.field));
            }
            if self.fields[..i].iter().any(|f| f.field == spec.field) {
                return invalid(format!("field {} is declared twice", spec.field));
            }
        }
        let slots = self.underlay_slots();
        for slot in 1..=slots {
            if !self
                .fields
                .iter()
                .any(|f| f.field == CanonicalField::Underlay(slot))
            {
                return invalid(format!("underlay slots must be contiguous, missing underlay_{}", slot));
            }
        }
        if self.header_rows == 0 || self.header_rows > 2 {
            return invalid(format!("header_rows must be 1 or 2, got {}", self.header_rows));
        }
        Ok(())
    }
}

/// One routing record with every canonical field typed
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRow {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub overlay: Option<String>,
    /// One entry per underlay slot of the schema
    pub underlays: Vec<Option<String>>,
    pub policy: Option<String>,
    pub criteria: Option<String>,
    pub forwarding_profile: Option<String>,
    pub next_hops: [Option<String>; 4],
    pub transport_primary: Option<String>,
    pub transport_secondary: Option<String>,
}

impl FlowRow {
    pub fn with_underlay_slots(slots: usize) -> Self {
        FlowRow {
            underlays: vec![None; slots],
            ..FlowRow::default()
        }
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        let value = match field {
            CanonicalField::Source => &self.source,
            CanonicalField::Destination => &self.destination,
            CanonicalField::Overlay => &self.overlay,
            CanonicalField::Underlay(slot) => {
                return slot
                    .checked_sub(1)
                    .and_then(|i| self.underlays.get(i))
                    .and_then(|v| v.as_deref());
            }
            CanonicalField::Policy => &self.policy,
            CanonicalField::Criteria => &self.criteria,
            CanonicalField::ForwardingProfile => &self.forwarding_profile,
            CanonicalField::NextHop(p) => &self.next_hops[p.index()],
            CanonicalField::TransportPrimary => &self.transport_primary,
            CanonicalField::TransportSecondary => &self.transport_secondary,
        };
        value.as_deref()
    }

    fn set(&mut self, field: CanonicalField, value: Option<String>) {
        if field == CanonicalField::Underlay(0) {
            return;
        }
        let slot = match field {
            CanonicalField::Source => &mut self.source,
            CanonicalField::Destination => &mut self.destination,
            CanonicalField::Overlay => &mut self.overlay,
            CanonicalField::Underlay(slot) => {
                if self.underlays.len() < slot {
                    self.underlays.resize(slot, None);
                }
                &mut self.underlays[slot - 1]
            }
            CanonicalField::Policy => &mut self.policy,
            CanonicalField::Criteria => &mut self.criteria,
            CanonicalField::ForwardingProfile => &mut self.forwarding_profile,
            CanonicalField::NextHop(p) => &mut self.next_hops[p.index()],
            CanonicalField::TransportPrimary => &mut self.transport_primary,
            CanonicalField::TransportSecondary => &mut self.transport_secondary,
        };
        *slot = value;
    }

    pub fn next_hop(&self, priority: Priority) -> Option<&str> {
        self.next_hops[priority.index()].as_deref()
    }

    /// Underlay values present in this row, with their 1-based slot
    pub fn present_underlays(&self) -> impl Iterator<Item = (usize, &str)> {
        self.underlays
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_deref().map(|v| (i + 1, v)))
    }
}

/// A raw header bound to a canonical field
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnBinding {
    pub field: CanonicalField,
    pub header: String,
    pub index: usize,
}

/// The canonical table: typed rows plus the mapping that produced them
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTable {
    pub schema: SchemaSpec,
    pub bindings: Vec<ColumnBinding>,
    pub rows: Vec<FlowRow>,
}

impl ResolvedTable {
    pub fn underlay_slots(&self) -> usize {
        self.schema.underlay_slots()
    }

    pub fn has_field(&self, field: CanonicalField) -> bool {
        self.bindings.iter().any(|b| b.field == field)
    }
}

/// Required canonical fields with no matching header, in declaration order
pub fn missing_fields(headers: &[String], schema: &SchemaSpec) -> Vec<String> {
    schema
        .fields
        .iter()
        .filter(|spec| spec.required)
        .filter(|spec| !spec.candidates.iter().any(|c| headers.contains(c)))
        .map(|spec| spec.field.to_string())
        .collect()
}

/// Maps a raw table onto `schema`
///
/// Fails with [`FlowError::SchemaMismatch`] when any required field has no
/// column; nothing else is produced in that case.
pub fn resolve(raw: &RawTable, schema: &SchemaSpec) -> Result<ResolvedTable> {
    schema.validate()?;
    let headers = raw.flattened_headers();

    let missing = missing_fields(&headers, schema);
    if !missing.is_empty() {
        debug!("available headers: {:?}", headers);
        return Err(FlowError::SchemaMismatch { missing });
    }

    let bindings: Vec<ColumnBinding> = schema
        .fields
        .iter()
        .filter_map(|spec| {
            spec.candidates.iter().find_map(|candidate| {
                headers
                    .iter()
                    .position(|h| h == candidate)
                    .map(|index| ColumnBinding {
                        field: spec.field,
                        header: candidate.clone(),
                        index,
                    })
            })
        })
        .collect();

    for binding in &bindings {
        debug!(
            "{} <- column {} '{}'",
            binding.field, binding.index, binding.header
        );
    }

    let slots = schema.underlay_slots();
    let rows = raw
        .rows
        .iter()
        .map(|cells| {
            let mut row = FlowRow::with_underlay_slots(slots);
            for binding in &bindings {
                let value = cells.get(binding.index).and_then(CellValue::as_string);
                row.set(binding.field, value);
            }
            row
        })
        .collect::<Vec<_>>();
    trace!("resolved {} rows with schema '{}'", rows.len(), schema.name);

    Ok(ResolvedTable {
        schema: schema.clone(),
        bindings,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| vec![Some(h.to_string())]).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| CellValue::text(*c)).collect())
                .collect(),
        }
    }

    #[test]
    fn canonical_names_round_trip() {
        for name in ["overlay", "underlay_3", "next_hop_tertiary", "forwarding_profile"] {
            let field: CanonicalField = name.parse().unwrap();
            assert_eq!(field.to_string(), name);
        }
        assert_eq!("underlay".parse::<CanonicalField>().unwrap(), CanonicalField::Underlay(1));
        assert!("underlay_0".parse::<CanonicalField>().is_err());
        assert!("overlay_id".parse::<CanonicalField>().is_err());
    }

    #[test]
    fn resolves_single_underlay_table() {
        let table = raw(
            &["Source", "Destination", "Overlay ID", "Underlay CID", "Next Hop Primary"],
            &[&["AppA", "AppZ", "OV1", "U1", "GW1"]],
        );
        let resolved = resolve(&table, &SchemaSpec::single_underlay()).unwrap();
        let row = &resolved.rows[0];
        assert_eq!(row.source.as_deref(), Some("AppA"));
        assert_eq!(row.overlay.as_deref(), Some("OV1"));
        assert_eq!(row.underlays, vec![Some("U1".to_string())]);
        assert_eq!(row.next_hop(Priority::Primary), Some("GW1"));
        assert_eq!(row.next_hop(Priority::Secondary), None);
        assert!(!resolved.has_field(CanonicalField::Policy));
    }

    #[test]
    fn missing_overlay_is_a_schema_mismatch() {
        let table = raw(
            &["Source", "Destination", "Underlay CID", "Next Hop Primary"],
            &[&["AppA", "AppZ", "U1", "GW1"]],
        );
        let err = resolve(&table, &SchemaSpec::single_underlay()).unwrap_err();
        assert_eq!(err.missing_fields(), Some(&["overlay".to_string()][..]));
    }

    #[test]
    fn exact_match_only() {
        let table = raw(
            &["source", "Destination", "Overlay ID", "Underlay CID", "Next Hop Primary"],
            &[],
        );
        let err = resolve(&table, &SchemaSpec::single_underlay()).unwrap_err();
        assert_eq!(err.missing_fields().unwrap(), ["source"]);
    }

    #[test]
    fn first_candidate_wins() {
        let table = raw(
            &["Overlay", "Overlay ID", "Underlay", "Source", "Destination", "Next Hop Primary"],
            &[&["first", "second", "U", "S", "D", "N"]],
        );
        let resolved = resolve(&table, &SchemaSpec::single_underlay()).unwrap();
        assert_eq!(resolved.rows[0].overlay.as_deref(), Some("second"));
    }

    #[test]
    fn json_schema_with_three_underlays() {
        let schema = SchemaSpec::from_json(
            r#"{
                "name": "triple",
                "fields": [
                    {"field": "overlay", "candidates": ["Tunnel"]},
                    {"field": "underlay_1", "candidates": ["A"]},
                    {"field": "underlay_2", "candidates": ["B"]},
                    {"field": "underlay_3", "candidates": ["C"], "required": false},
                    {"field": "destination", "candidates": ["To"]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(schema.underlay_slots(), 3);
        assert_eq!(schema.header_rows, 1);

        let table = raw(&["Tunnel", "A", "B", "To"], &[&["T1", "a", "", "X"]]);
        let resolved = resolve(&table, &schema).unwrap();
        assert_eq!(resolved.rows[0].underlays, vec![Some("a".into()), None, None]);
        assert_eq!(resolved.rows[0].present_underlays().count(), 1);
    }

    #[test]
    fn invalid_schemas_are_rejected() {
        let gap = r#"{"name":"gap","fields":[
            {"field":"overlay","candidates":["O"]},
            {"field":"destination","candidates":["D"]},
            {"field":"underlay_2","candidates":["U"]}]}"#;
        assert!(matches!(SchemaSpec::from_json(gap), Err(FlowError::InvalidSchema { .. })));
        assert!(matches!(
            SchemaSpec::preset("triple"),
            Err(FlowError::UnknownSchema { .. })
        ));
        for name in PRESET_NAMES {
            SchemaSpec::preset(name).unwrap().validate().unwrap();
        }
    }
}
