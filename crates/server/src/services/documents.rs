use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tertulia_agent::services::DocumentStore;
use tertulia_core::errors::ServiceError;

const SERVICE: &str = "documents";

/// Certificate files kept in one local directory.
pub struct FileDocumentStore {
    directory: PathBuf,
}

impl FileDocumentStore {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn load(&self, name: &str) -> Result<Vec<u8>, ServiceError> {
        // Plain file names only.
        let mut components = Path::new(name).components();
        if !matches!((components.next(), components.next()), (Some(Component::Normal(_)), None)) {
            return Err(ServiceError::transport(SERVICE, format!("invalid document name `{name}`")));
        }

        tokio::fs::read(self.directory.join(name))
            .await
            .map_err(|error| ServiceError::transport(SERVICE, format!("{name}: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tertulia_agent::services::DocumentStore;

    use super::FileDocumentStore;

    fn resources() -> FileDocumentStore {
        FileDocumentStore::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../resources"))
    }

    #[tokio::test]
    async fn bundled_certificates_are_pdf_files() {
        let bytes = resources().load("cert-nomina.pdf").await.expect("payroll certificate");
        assert!(bytes.starts_with(b"%PDF"));

        let bytes = resources().load("cert-ingresos.pdf").await.expect("income certificate");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn names_outside_the_directory_are_rejected() {
        let error = resources().load("../Cargo.toml").await.expect_err("traversal");
        assert!(error.raw_message().contains("invalid document name"));

        assert!(resources().load("cert-missing.pdf").await.is_err());
    }
}
