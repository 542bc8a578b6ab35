use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryPrincipalRepo {
    rows: Mutex<Vec<PrincipalRecord>>,
}

impl MemoryPrincipalRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: PrincipalRecord) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.push(record);
        }
    }
}

#[async_trait::async_trait]
impl PrincipalRepo for MemoryPrincipalRepo {
    async fn find_by_subject_and_provider(
        &self,
        subject: &str,
        provider: Provider,
    ) -> Result<Option<PrincipalRecord>, TokenError> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| TokenError::Store(e.to_string()))?;
        Ok(rows
            .iter()
            .find(|r| r.subject == subject && r.provider == provider)
            .cloned())
    }
}
