//! Profile export tools.
//!
//! Both tools run one query over raw `profiles` rows and write one file into
//! the export directory. File names carry a UUID so concurrent exports never
//! collide; removing old exports is left to the operator.

use crate::db::QueryExecutor;
use crate::error::{ToolError, ToolResult};
use crate::models::{JsonRow, MAX_ROW_LIMIT, QueryParam, QueryRequest, QueryResult};
use crate::tools::input::{clamp_limit, optional_non_blank};
use crate::tools::registry::FloatTool;
use humansize::{DECIMAL, format_size};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// On-disk format of a profile export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    /// INSERT statements against `profiles`
    Sql,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Sql => "sql",
        }
    }
}

// =============================================================================
// Encoders
// =============================================================================

fn csv_field(value: &JsonValue) -> String {
    let text = match value {
        JsonValue::Null => return String::new(),
        JsonValue::String(s) => s.clone(),
        _ => value.to_string(),
    };
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

/// RFC 4180 CSV: header line, then one line per row in column order.
pub fn encode_csv(columns: &[String], rows: &[JsonRow]) -> String {
    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .map(|c| csv_field(&JsonValue::String(c.clone())))
        .collect();
    out.push_str(&header.join(","));
    out.push_str("\r\n");
    for row in rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|c| csv_field(row.get(c).unwrap_or(&JsonValue::Null)))
            .collect();
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }
    out
}

fn sql_literal(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(true) => "TRUE".to_string(),
        JsonValue::Bool(false) => "FALSE".to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => format!("'{}'", s.replace('\'', "''")),
        JsonValue::Array(_) | JsonValue::Object(_) => {
            format!("'{}'", value.to_string().replace('\'', "''"))
        }
    }
}

fn sql_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// One INSERT statement per row.
pub fn encode_sql(table: &str, columns: &[String], rows: &[JsonRow]) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| sql_identifier(c)).collect();
    let column_list = column_list.join(", ");
    let mut out = String::new();
    for row in rows {
        let values: Vec<String> = columns
            .iter()
            .map(|c| sql_literal(row.get(c).unwrap_or(&JsonValue::Null)))
            .collect();
        out.push_str(&format!(
            "INSERT INTO {} ({}) VALUES ({});\n",
            table,
            column_list,
            values.join(", ")
        ));
    }
    out
}

/// Write `contents` to a fresh file under `dir` on the blocking pool.
async fn write_file(dir: PathBuf, file_name: String, contents: Vec<u8>) -> ToolResult<(PathBuf, u64)> {
    tokio::task::spawn_blocking(move || -> ToolResult<(PathBuf, u64)> {
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);
        std::fs::write(&path, &contents)?;
        Ok((path, contents.len() as u64))
    })
    .await
    .map_err(|e| ToolError::internal(format!("Export task failed: {}", e)))?
}

fn zip_error(err: zip::result::ZipError) -> ToolError {
    ToolError::handler(format!("Failed to build archive: {}", err))
}

/// Zip the given named entries with deflate.
pub fn build_archive(path: &Path, entries: &[(&str, &[u8])]) -> ToolResult<u64> {
    let file = std::fs::File::create(path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(*name, options).map_err(zip_error)?;
        writer.write_all(data)?;
    }
    let file = writer.finish().map_err(zip_error)?;
    Ok(file.metadata()?.len())
}

// =============================================================================
// Shared query
// =============================================================================

fn default_export_limit() -> u32 {
    MAX_ROW_LIMIT
}

/// Raw profile rows, filtered by profile key (preferred) or float id.
async fn fetch_profiles(
    executor: &QueryExecutor,
    float_id: Option<&str>,
    profile_key: Option<&str>,
    limit: u32,
) -> ToolResult<QueryResult> {
    let mut sql = String::from("SELECT * FROM profiles");
    let mut params = Vec::new();
    if let Some(key) = profile_key {
        sql.push_str(" WHERE source_file || ':' || CAST(profile_index AS TEXT) = $1");
        params.push(QueryParam::from(key));
    } else if let Some(id) = float_id {
        sql.push_str(" WHERE CAST(float_id AS TEXT) = $1");
        params.push(QueryParam::from(id));
    }
    params.push(QueryParam::Int(i64::from(limit)));
    sql.push_str(&format!(" ORDER BY time ASC LIMIT ${}", params.len()));

    let request = QueryRequest::new(sql).with_params(params).with_limit(limit);
    let result = executor.run(&request).await?;
    if result.is_empty() {
        return Err(ToolError::handler("no rows matched the export filter"));
    }
    Ok(result)
}

// =============================================================================
// profile_export
// =============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProfileExportInput {
    /// Export every level of this float
    #[serde(default)]
    pub float_id: Option<String>,
    /// Export one profile, as "<source_file>:<profile_index>". Takes precedence over float_id
    #[serde(default)]
    pub profile_key: Option<String>,
    /// File format. Default: csv
    #[serde(default)]
    pub format: ExportFormat,
    /// Maximum rows. Default and max: 100000
    #[serde(default = "default_export_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileExportOutput {
    pub rows: usize,
    /// Server-side path of the written file
    pub path: String,
    pub format: ExportFormat,
    pub size_bytes: u64,
}

pub struct ProfileExportTool {
    export_dir: PathBuf,
}

impl ProfileExportTool {
    pub fn new(export_dir: PathBuf) -> Self {
        Self { export_dir }
    }
}

impl FloatTool for ProfileExportTool {
    type Input = ProfileExportInput;
    type Output = ProfileExportOutput;

    const NAME: &'static str = "profile_export";
    const TITLE: &'static str = "Profile Data Export";
    const DESCRIPTION: &'static str =
        "Export raw profile rows (optionally for one float or profile) to a CSV or SQL file on the server and return its path.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        Ok(ProfileExportInput {
            float_id: optional_non_blank("float_id", input.float_id)?,
            profile_key: optional_non_blank("profile_key", input.profile_key)?,
            limit: clamp_limit(input.limit, MAX_ROW_LIMIT),
            ..input
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let result = fetch_profiles(
            executor,
            input.float_id.as_deref(),
            input.profile_key.as_deref(),
            input.limit,
        )
        .await?;

        let contents = match input.format {
            ExportFormat::Csv => encode_csv(&result.columns, &result.rows),
            ExportFormat::Sql => encode_sql("profiles", &result.columns, &result.rows),
        };
        let file_name = format!("profile_export_{}.{}", Uuid::new_v4(), input.format.extension());
        let (path, size_bytes) =
            write_file(self.export_dir.clone(), file_name, contents.into_bytes()).await?;

        info!(
            rows = result.row_count,
            path = %path.display(),
            size = %format_size(size_bytes, DECIMAL),
            "Profile export written"
        );

        Ok(ProfileExportOutput {
            rows: result.row_count,
            path: path.display().to_string(),
            format: input.format,
            size_bytes,
        })
    }
}

// =============================================================================
// netcdf_export
// =============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NetcdfExportInput {
    /// Export every level of this float
    #[serde(default)]
    pub float_id: Option<String>,
    /// Export one profile, as "<source_file>:<profile_index>". Takes precedence over float_id
    #[serde(default)]
    pub profile_key: Option<String>,
    /// Maximum rows. Default and max: 100000
    #[serde(default = "default_export_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetcdfExportOutput {
    pub zip_path: String,
    pub rows: usize,
}

pub struct NetcdfExportTool {
    export_dir: PathBuf,
}

impl NetcdfExportTool {
    pub fn new(export_dir: PathBuf) -> Self {
        Self { export_dir }
    }
}

impl FloatTool for NetcdfExportTool {
    type Input = NetcdfExportInput;
    type Output = NetcdfExportOutput;

    const NAME: &'static str = "netcdf_export";
    const TITLE: &'static str = "NetCDF Export (zipped CSV + metadata)";
    const DESCRIPTION: &'static str =
        "Package raw profile rows as profiles.csv plus metadata.json in a zip archive on the server and return its path.";

    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        Ok(NetcdfExportInput {
            float_id: optional_non_blank("float_id", input.float_id)?,
            profile_key: optional_non_blank("profile_key", input.profile_key)?,
            limit: clamp_limit(input.limit, MAX_ROW_LIMIT),
        })
    }

    async fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> ToolResult<Self::Output> {
        let result = fetch_profiles(
            executor,
            input.float_id.as_deref(),
            input.profile_key.as_deref(),
            input.limit,
        )
        .await?;

        let csv = encode_csv(&result.columns, &result.rows);
        let metadata = json!({
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "source": "FloatChat MCP",
            "rows": result.row_count,
            "float_id": input.float_id,
            "profile_key": input.profile_key,
            "columns": result.columns,
        });
        let metadata = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| ToolError::internal(format!("Failed to encode metadata: {}", e)))?;

        let path = self
            .export_dir
            .join(format!("netcdf_like_{}.zip", Uuid::new_v4()));
        let dir = self.export_dir.clone();
        let zip_path = path.clone();
        let size_bytes = tokio::task::spawn_blocking(move || -> ToolResult<u64> {
            std::fs::create_dir_all(&dir)?;
            build_archive(
                &zip_path,
                &[
                    ("profiles.csv", csv.as_bytes()),
                    ("metadata.json", metadata.as_slice()),
                ],
            )
        })
        .await
        .map_err(|e| ToolError::internal(format!("Export task failed: {}", e)))??;

        info!(
            rows = result.row_count,
            path = %path.display(),
            size = %format_size(size_bytes, DECIMAL),
            "Archive export written"
        );

        Ok(NetcdfExportOutput {
            zip_path: path.display().to_string(),
            rows: result.row_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn row(value: JsonValue) -> JsonRow {
        value.as_object().cloned().unwrap()
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_csv_quoting() {
        let cols = columns(&["float_id", "qc", "depth", "note"]);
        let rows = vec![
            row(json!({"float_id": "2902746", "qc": "1,2", "depth": 5.5, "note": null})),
            row(json!({"float_id": "2902747", "qc": "say \"hi\"", "depth": 10, "note": "a\nb"})),
        ];
        let csv = encode_csv(&cols, &rows);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], "float_id,qc,depth,note");
        assert_eq!(lines[1], "2902746,\"1,2\",5.5,");
        assert_eq!(lines[2], "2902747,\"say \"\"hi\"\"\",10,\"a\nb\"");
        assert_eq!(lines[3], "");
    }

    #[test]
    fn test_csv_nested_values_are_json() {
        let cols = columns(&["raw_metadata"]);
        let rows = vec![row(json!({"raw_metadata": {"a": 1}}))];
        let csv = encode_csv(&cols, &rows);
        assert!(csv.contains("\"{\"\"a\"\":1}\""));
    }

    #[test]
    fn test_sql_encoding() {
        let cols = columns(&["float_id", "depth", "qc", "ok"]);
        let rows = vec![row(json!({"float_id": "O'Brien", "depth": 1.5, "qc": null, "ok": true}))];
        let sql = encode_sql("profiles", &cols, &rows);
        assert_eq!(
            sql,
            "INSERT INTO profiles (\"float_id\", \"depth\", \"qc\", \"ok\") VALUES ('O''Brien', 1.5, NULL, TRUE);\n"
        );
    }

    #[test]
    fn test_archive_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.zip");
        let size = build_archive(
            &path,
            &[
                ("profiles.csv", b"a,b\r\n".as_slice()),
                ("metadata.json", b"{}".as_slice()),
            ],
        )
        .unwrap();
        assert!(size > 0);

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut csv = String::new();
        archive.by_name("profiles.csv").unwrap().read_to_string(&mut csv).unwrap();
        assert_eq!(csv, "a,b\r\n");
        assert!(archive.by_name("metadata.json").is_ok());
    }

    #[test]
    fn test_export_input_defaults() {
        let input: ProfileExportInput = serde_json::from_value(json!({})).unwrap();
        assert_eq!(input.format, ExportFormat::Csv);
        assert_eq!(input.limit, MAX_ROW_LIMIT);
        assert!(serde_json::from_value::<ProfileExportInput>(json!({"format": "parquet"})).is_err());

        let tool = ProfileExportTool::new(std::env::temp_dir());
        let input = ProfileExportInput {
            float_id: Some("  ".into()),
            profile_key: None,
            format: ExportFormat::Csv,
            limit: 10,
        };
        assert!(tool.sanitize(input).is_err());
    }
}
