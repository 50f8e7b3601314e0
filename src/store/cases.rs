use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{StoreError, StoreResult};
use crate::core::case::CaseRecord;

/// Storage for case records.
pub trait CaseStore: Send + Sync {
    /// All cases, sorted by id.
    fn list(&self) -> Vec<CaseRecord>;

    fn get(&self, id: &str) -> Option<CaseRecord>;

    /// Store a new case, assigning a UUID when `case_id` is missing.
    fn insert(&self, case: CaseRecord) -> StoreResult<CaseRecord>;

    /// Replace the assessment criteria of an existing case.
    fn update_criteria(&self, id: &str, criteria: String) -> StoreResult<CaseRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type SharedCaseStore = Arc<dyn CaseStore>;

/// [`CaseStore`] backed by a concurrent hash map.
#[derive(Default)]
pub struct MemoryCaseStore {
    cases: DashMap<String, CaseRecord>,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from seed records. Later duplicates replace earlier ones.
    pub fn with_cases(cases: impl IntoIterator<Item = CaseRecord>) -> Self {
        let store = Self::new();
        for mut case in cases {
            let id = assign_id(&mut case);
            if store.cases.insert(id.clone(), case).is_some() {
                warn!(case_id = %id, "Duplicate seed case replaced");
            }
        }
        store
    }
}

fn assign_id(case: &mut CaseRecord) -> String {
    match case.case_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let id = uuid::Uuid::new_v4().to_string();
            case.case_id = Some(id.clone());
            id
        }
    }
}

impl CaseStore for MemoryCaseStore {
    fn list(&self) -> Vec<CaseRecord> {
        let mut cases: Vec<CaseRecord> = self.cases.iter().map(|e| e.value().clone()).collect();
        cases.sort_by(|a, b| a.id().cmp(b.id()));
        cases
    }

    fn get(&self, id: &str) -> Option<CaseRecord> {
        self.cases.get(id).map(|e| e.value().clone())
    }

    fn insert(&self, mut case: CaseRecord) -> StoreResult<CaseRecord> {
        let id = assign_id(&mut case);
        match self.cases.entry(id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(case.clone());
                info!(case_id = %id, "Case stored");
                Ok(case)
            }
        }
    }

    fn update_criteria(&self, id: &str, criteria: String) -> StoreResult<CaseRecord> {
        let mut entry = self
            .cases
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.custom_criteria = Some(criteria);
        debug!(case_id = %id, "Case criteria updated");
        Ok(entry.clone())
    }

    fn len(&self) -> usize {
        self.cases.len()
    }
}

/// Read every `*.json` file in `dir` as a case.
///
/// A file without `case_id` takes its file stem as the id. Unreadable or
/// malformed files are skipped with a warning. A missing directory yields
/// no cases.
pub fn load_seed_dir(dir: &Path) -> StoreResult<Vec<CaseRecord>> {
    if !dir.exists() {
        warn!(dir = %dir.display(), "Case seed directory does not exist");
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| StoreError::Seed(format!("{}: {e}", dir.display())))?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut cases = Vec::with_capacity(paths.len());
    for path in paths {
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<CaseRecord>(&text).map_err(|e| e.to_string()));

        match parsed {
            Ok(mut case) => {
                if case.case_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
                    case.case_id = path
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned());
                }
                cases.push(case);
            }
            Err(e) => warn!(file = %path.display(), "Skipping case file: {e}"),
        }
    }

    info!(dir = %dir.display(), count = cases.len(), "Loaded seed cases");
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn case(id: &str) -> CaseRecord {
        CaseRecord {
            case_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_list_sorted_by_id() {
        let store = MemoryCaseStore::with_cases([case("b"), case("c"), case("a")]);
        let ids: Vec<String> = store.list().iter().map(|c| c.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_insert_assigns_uuid() {
        let store = MemoryCaseStore::new();
        let stored = store.insert(CaseRecord::default()).unwrap();
        assert!(uuid::Uuid::parse_str(stored.id()).is_ok());
        assert_eq!(store.get(stored.id()), Some(stored));
    }

    #[test]
    fn test_insert_duplicate_rejected() {
        let store = MemoryCaseStore::new();
        store.insert(case("dup")).unwrap();
        assert_eq!(
            store.insert(case("dup")),
            Err(StoreError::AlreadyExists("dup".to_string()))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_criteria() {
        let store = MemoryCaseStore::with_cases([case("c1")]);
        let updated = store
            .update_criteria("c1", "1. Asks about smoking".to_string())
            .unwrap();
        assert_eq!(updated.custom_criteria.as_deref(), Some("1. Asks about smoking"));
        assert_eq!(
            store.update_criteria("missing", String::new()),
            Err(StoreError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_seed_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("chest_pain.json"),
            r#"{"patient_name": "Mr Lim", "age": 60}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("other.json"),
            r#"{"case_id": "headache-02", "chief_complaint": "Headache"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let cases = load_seed_dir(dir.path()).unwrap();
        let ids: Vec<&str> = cases.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["chest_pain", "headache-02"]);
    }

    #[test]
    fn test_seed_dir_missing() {
        let dir = TempDir::new().unwrap();
        let cases = load_seed_dir(&dir.path().join("nope")).unwrap();
        assert!(cases.is_empty());
    }
}
