pub mod config;
pub mod migrate;
pub mod status;

use importdb::SchemaKind;

/// clap value parser for logical database names
pub(crate) fn parse_kind(s: &str) -> Result<SchemaKind, String> {
    s.parse::<SchemaKind>().map_err(|e| {
        let known: Vec<&str> = SchemaKind::all().iter().map(|k| k.name()).collect();
        format!("{} (expected one of: {})", e, known.join(", "))
    })
}
