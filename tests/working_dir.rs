//! `from_working_dir` against the real process working directory. Changing
//! the working directory affects the whole process, so this lives in its own
//! test binary.

use allocstats::data::{AllocationRecord, PathAliases};
use allocstats::query::AllocationsProxy;
use allocstats::runtime::{AllocationSite, Object, ObjectRef};
use std::path::Path;
use std::sync::Arc;

fn canonical(path: &Path) -> String {
    path.canonicalize().unwrap().to_str().unwrap().to_string()
}

#[test]
fn test_working_dir_captured_when_query_is_built() {
    let original = std::env::current_dir().unwrap();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let first_dir = canonical(first.path());
    let second_dir = canonical(second.path());

    let aliases = Arc::new(PathAliases::none());
    let values: Vec<ObjectRef> = vec![
        Arc::new(Object::str("first")) as ObjectRef,
        Arc::new(Object::str("second")) as ObjectRef,
    ];
    let records = vec![
        AllocationRecord::new(
            &values[0],
            40,
            AllocationSite::new(format!("{}/src/lib.rs", first_dir), 1),
            Arc::clone(&aliases),
        ),
        AllocationRecord::new(
            &values[1],
            40,
            AllocationSite::new(format!("{}/src/lib.rs", second_dir), 2),
            Arc::clone(&aliases),
        ),
    ];

    std::env::set_current_dir(&first_dir).unwrap();
    let query = AllocationsProxy::new(&records, false).from_working_dir();
    std::env::set_current_dir(&second_dir).unwrap();

    let resolved = query.resolve().unwrap();
    let kept = resolved.as_records().unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].source_line(), Some(1));

    // A query built after the change sees the new directory
    let resolved = AllocationsProxy::new(&records, false)
        .from_working_dir()
        .resolve()
        .unwrap();
    let kept = resolved.as_records().unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].source_line(), Some(2));

    std::env::set_current_dir(original).unwrap();
}
