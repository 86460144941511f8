use super::Store;
use tempfile::tempdir;

#[test]
fn test_set_and_get() {
    let store = Store::temporary().unwrap();
    store.set("prices", "{\"timestamp\":1,\"payload\":3}").unwrap();

    assert_eq!(
        store.get("prices").unwrap().as_deref(),
        Some("{\"timestamp\":1,\"payload\":3}")
    );
    assert_eq!(store.len(), 1);
}

#[test]
fn test_set_overwrites_previous_value() {
    let store = Store::temporary().unwrap();
    store.set("topic", "first").unwrap();
    store.set("topic", "second").unwrap();

    assert_eq!(store.get("topic").unwrap().as_deref(), Some("second"));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_missing_key_is_none() {
    let store = Store::temporary().unwrap();
    assert!(store.is_empty());
    assert_eq!(store.get("nonexistent_topic").unwrap(), None);
}

#[test]
fn test_values_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    let path = path.to_str().unwrap();

    {
        let store = Store::open(path).unwrap();
        store.set("durable", "kept").unwrap();
        store.flush().unwrap();
    }

    let store = Store::open(path).unwrap();
    assert_eq!(store.get("durable").unwrap().as_deref(), Some("kept"));
}
