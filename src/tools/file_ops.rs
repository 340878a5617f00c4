//! File tools: read, write, list, and root inspection.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Tool};
use crate::sandbox::ProjectRoot;

/// Read a file from the project.
pub struct ReadFile;

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from the project directory. Returns an empty string if the file does not exist yet."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Project-relative file path, e.g. 'index.html'"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, root: &ProjectRoot) -> anyhow::Result<String> {
        let path = required_str(&args, "path")?;
        Ok(root.read(path).await?)
    }
}

/// Write (create or overwrite) a file in the project.
pub struct WriteFile;

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        super::WRITE_TOOL
    }

    fn description(&self) -> &str {
        "Write the full content of a file in the project directory. Creates parent directories and overwrites existing content. Your step is not complete until this has been called."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Project-relative file path, e.g. 'css/styles.css'"
                },
                "content": {
                    "type": "string",
                    "description": "Complete file content"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, root: &ProjectRoot) -> anyhow::Result<String> {
        let path = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;
        let written = root.write(path, content).await?;
        Ok(format!("WROTE:{}", written.display()))
    }
}

/// List files under a project directory.
pub struct ListFiles;

#[async_trait]
impl Tool for ListFiles {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "Recursively list the files under a project directory (default: the project root)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Project-relative directory (default: '.')"
                }
            }
        })
    }

    async fn execute(&self, args: Value, root: &ProjectRoot) -> anyhow::Result<String> {
        let directory = args["directory"].as_str().unwrap_or(".");
        let files = root.list(directory).await?;
        if files.is_empty() {
            Ok("No files found.".to_string())
        } else {
            Ok(files.join("\n"))
        }
    }
}

/// Report the project root directory.
pub struct GetCurrentDirectory;

#[async_trait]
impl Tool for GetCurrentDirectory {
    fn name(&self) -> &str {
        "get_current_directory"
    }

    fn description(&self) -> &str {
        "Return the absolute path of the project directory all other tools operate in."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value, root: &ProjectRoot) -> anyhow::Result<String> {
        // Same liveness check as every other sandbox operation.
        root.resolve(".")?;
        Ok(root.path().display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_list_and_read() {
        let dir = TempDir::new().unwrap();
        let root = ProjectRoot::open(dir.path()).unwrap();

        let out = WriteFile
            .execute(json!({"path": "js/app.js", "content": "let x = 1;"}), &root)
            .await
            .unwrap();
        assert!(out.starts_with("WROTE:"));

        let listed = ListFiles.execute(json!({}), &root).await.unwrap();
        assert_eq!(listed, "js/app.js");

        let read = ReadFile
            .execute(json!({"path": "js/app.js"}), &root)
            .await
            .unwrap();
        assert_eq!(read, "let x = 1;");
    }

    #[tokio::test]
    async fn empty_listing_and_missing_args() {
        let dir = TempDir::new().unwrap();
        let root = ProjectRoot::open(dir.path()).unwrap();
        assert_eq!(
            ListFiles.execute(json!({}), &root).await.unwrap(),
            "No files found."
        );
        let err = WriteFile
            .execute(json!({"path": "a.txt"}), &root)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing 'content' argument");
    }

    #[tokio::test]
    async fn escape_is_reported_as_error() {
        let dir = TempDir::new().unwrap();
        let root = ProjectRoot::open(dir.path()).unwrap();
        let err = WriteFile
            .execute(json!({"path": "../x.txt", "content": ""}), &root)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("escapes the project root"));
    }

    #[tokio::test]
    async fn reports_root_path() {
        let dir = TempDir::new().unwrap();
        let root = ProjectRoot::open(dir.path()).unwrap();
        let out = GetCurrentDirectory.execute(json!({}), &root).await.unwrap();
        assert_eq!(out, root.path().display().to_string());
    }
}
