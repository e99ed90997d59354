//! CRUD, identity and query scenarios, run against every driver.

#[macro_use]
mod common;

use common::{product_model, setting_model, user_model, TestBackend};
use dataconn_core::{Configuration, Error, ErrorKind, Object, RepositoryManager, Value};

fn usernames(objects: &[Object]) -> Vec<String> {
    let mut names: Vec<String> = objects
        .iter()
        .map(|o| o.get("username").unwrap().as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

fn create_and_find_share_instance(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();

    let user = users
        .create([("username", "Kredh"), ("password", "fore123")])
        .unwrap();
    assert_eq!(user.get("id").unwrap(), Value::Int64(1));

    let found = users.find(1).unwrap();
    assert!(found.is(&user));

    let all = users.get_all().unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is(&user));
}

fn query_by_username(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();
    let kredh = users
        .create([("username", "Kredh"), ("password", "fore123")])
        .unwrap();
    users
        .create([("username", "Nitrate"), ("password", "secret")])
        .unwrap();

    let found = users
        .query()
        .filter("username = ?", "Kredh")
        .unwrap()
        .first()
        .unwrap()
        .unwrap();
    assert!(found.is(&kredh));
    assert_eq!(found.get("password").unwrap(), Value::from("fore123"));

    let others = users.query().filter("username != ?", "Kredh").unwrap().execute().unwrap();
    assert_eq!(usernames(&others), vec!["Nitrate"]);

    let none = users.query().filter("username = ?", "Nobody").unwrap().first().unwrap();
    assert!(none.is_none());
}

fn comparison_and_connectors(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();
    for name in ["Ann", "Bob", "Cyd", "Dee"] {
        users.create([("username", name)]).unwrap();
    }

    let below = users.query().filter("id < ?", 3).unwrap().execute().unwrap();
    assert_eq!(usernames(&below), vec!["Ann", "Bob"]);

    let upto = users.query().filter("id <= ?", 3).unwrap().execute().unwrap();
    assert_eq!(usernames(&upto), vec!["Ann", "Bob", "Cyd"]);

    let between = users
        .query()
        .filter("id > ?", 1)
        .unwrap()
        .filter("id <= ?", 3)
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(usernames(&between), vec!["Bob", "Cyd"]);

    // and binds tighter than or
    let mixed = users
        .query()
        .filter("id > ?", 2)
        .unwrap()
        .filter("username = ?", "Dee")
        .unwrap()
        .or_filter("username = ?", "Ann")
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(usernames(&mixed), vec!["Ann", "Dee"]);

    let containing = users.query().filter("? in username", "y").unwrap().execute().unwrap();
    assert_eq!(usernames(&containing), vec!["Cyd"]);
}

fn query_rejects_bad_filters(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();

    let err = users.query().filter("age = ?", 3).unwrap_err();
    assert!(matches!(err, Error::UnknownField { .. }));

    let err = users.query().filter("id = ?", "three").unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));

    let err = users.query().filter("username ~ ?", "x").unwrap_err();
    assert!(matches!(err, Error::Filter(_)));

    let err = users
        .query()
        .filter_with("xor", "id = ?", vec![Value::from(1)])
        .unwrap_err();
    assert!(matches!(err, Error::Filter(_)));
}

fn primary_key_update_rekeys(driver: &str) {
    let mut backend = TestBackend::open(driver);
    let settings = backend.manager.record_model(setting_model()).unwrap();
    let setting = settings
        .create([("key", "theme"), ("value", "dark")])
        .unwrap();

    let old = settings.update(&setting, "key", "colors").unwrap();
    assert_eq!(old, Value::from("theme"));
    assert!(settings.find("colors").unwrap().is(&setting));
    assert!(matches!(
        settings.find("theme").unwrap_err(),
        Error::ObjectNotFound { .. }
    ));

    backend.reopen();
    let settings = backend.manager.record_model(setting_model()).unwrap();
    let reloaded = settings.find("colors").unwrap();
    assert_eq!(reloaded.get("value").unwrap(), Value::from("dark"));
    assert!(settings.find("theme").is_err());
}

fn duplicate_key_conflicts(driver: &str) {
    let backend = TestBackend::open(driver);
    let settings = backend.manager.record_model(setting_model()).unwrap();
    let theme = settings.create([("key", "theme")]).unwrap();
    let lang = settings.create([("key", "lang")]).unwrap();

    let err = settings.create([("key", "theme")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = lang.set("key", "theme").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(lang.get("key").unwrap(), Value::from("lang"));

    // A deleted key can be taken again.
    settings.delete(&theme).unwrap();
    let again = settings.create([("key", "theme")]).unwrap();
    assert!(!again.is(&theme));
    assert!(settings.find("theme").unwrap().is(&again));
}

fn auto_increment_survives_reopen(driver: &str) {
    let mut backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();
    users.create([("username", "Ann")]).unwrap();
    let bob = users.create([("username", "Bob")]).unwrap();
    users.delete(&bob).unwrap();

    backend.reopen();
    let users = backend.manager.record_model(user_model()).unwrap();
    let cyd = users.create([("username", "Cyd")]).unwrap();
    assert_eq!(cyd.get("id").unwrap(), Value::Int64(3));
    assert!(matches!(users.find(2).unwrap_err(), Error::ObjectNotFound { .. }));
    assert_eq!(usernames(&users.get_all().unwrap()), vec!["Ann", "Cyd"]);
}

fn deleted_objects_refuse_updates(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();
    let user = users.create([("username", "Kredh")]).unwrap();
    let handle = users.find(1).unwrap();

    users.delete(&user).unwrap();
    assert!(handle.is_deleted());
    assert!(matches!(
        handle.set("password", "x").unwrap_err(),
        Error::UpdateDeletedObject { .. }
    ));
    assert!(matches!(
        users.delete(&user).unwrap_err(),
        Error::UpdateDeletedObject { .. }
    ));
    assert!(matches!(users.find(1).unwrap_err(), Error::ObjectNotFound { .. }));
    assert!(users.get_all().unwrap().is_empty());
    assert!(users.query().filter("username = ?", "Kredh").unwrap().first().unwrap().is_none());
}

fn defaults_fill_missing_fields(driver: &str) {
    let backend = TestBackend::open(driver);
    let products = backend.manager.record_model(product_model()).unwrap();

    let plain = products.create([("name", "bolt")]).unwrap();
    assert_eq!(plain.get("price").unwrap(), Value::Int64(0));
    assert_eq!(plain.get("quantity").unwrap(), Value::Int64(1));
    assert_eq!(plain.get("total").unwrap(), Value::Int64(0));

    let priced = products
        .create([
            ("name", Value::from("nut")),
            ("price", Value::from(4)),
            ("quantity", Value::from(3)),
        ])
        .unwrap();
    assert_eq!(priced.get("total").unwrap(), Value::Int64(12));
}

fn create_validates_values(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();

    let err = users.create([("username", "x".repeat(31))]).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));

    let err = users.create([("password", "fore123")]).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));

    let err = users.create([("username", "Kredh"), ("email", "k@x")]).unwrap_err();
    assert!(matches!(err, Error::UnknownField { .. }));

    let err = users
        .create([("id", Value::from(7)), ("username", Value::from("Kredh"))])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));

    let user = users.create([("username", "Kredh")]).unwrap();
    assert!(matches!(
        user.set("username", 5).unwrap_err(),
        Error::InvalidValue { .. }
    ));
    assert!(matches!(user.set("id", 9).unwrap_err(), Error::InvalidValue { .. }));
    assert!(users.get_all().unwrap().len() == 1);
}

fn update_persists_across_reopen(driver: &str) {
    let mut backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();
    let user = users
        .create([("username", "Kredh"), ("password", "fore123")])
        .unwrap();
    user.set("password", "hunter2").unwrap();
    assert_eq!(user.get("password").unwrap(), Value::from("hunter2"));

    backend.reopen();
    assert!(user.is_deleted());
    let users = backend.manager.record_model(user_model()).unwrap();
    let reloaded = users.find(1).unwrap();
    assert_eq!(reloaded.get("password").unwrap(), Value::from("hunter2"));
}

fn clear_removes_everything(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();
    users.create([("username", "Ann")]).unwrap();
    users.create([("username", "Bob")]).unwrap();

    backend.manager.clear().unwrap();
    assert!(users.get_all().unwrap().is_empty());
    assert!(users.find(1).is_err());
}

fn not_equal_includes_null_fields(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();
    users
        .create([("username", "Kredh"), ("password", "fore123")])
        .unwrap();
    users.create([("username", "Nitrate")]).unwrap();

    let others = users
        .query()
        .filter("password != ?", "fore123")
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(usernames(&others), vec!["Nitrate"]);

    let set = users
        .query()
        .filter("password != ?", Value::Null)
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(usernames(&set), vec!["Kredh"]);
}

fn contains_matches_literal_text(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();
    for name in ["Kredh", "a_b", "50%off"] {
        users.create([("username", name)]).unwrap();
    }
    let containing = |needle: &str| {
        usernames(
            &users
                .query()
                .filter("? in username", needle)
                .unwrap()
                .execute()
                .unwrap(),
        )
    };

    assert_eq!(containing("red"), vec!["Kredh"]);
    assert!(containing("KRED").is_empty());
    assert_eq!(containing("_"), vec!["a_b"]);
    assert_eq!(containing("%"), vec!["50%off"]);
    assert!(containing("a%b").is_empty());
}

fn handles_from_another_manager_are_refused(driver: &str) {
    let first = TestBackend::open(driver);
    let second = TestBackend::open(driver);
    let users = first.manager.record_model(user_model()).unwrap();
    let others = second.manager.record_model(user_model()).unwrap();
    let ann = users.create([("username", "Ann")]).unwrap();
    let bob = others.create([("username", "Bob")]).unwrap();
    assert_eq!(ann.id(), bob.id());
    assert!(!ann.is(&bob));

    let err = users.update(&bob, "username", "Eve").unwrap_err();
    assert!(matches!(err, Error::Usage(_)));
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(matches!(users.delete(&bob).unwrap_err(), Error::Usage(_)));

    assert_eq!(ann.get("username").unwrap(), Value::from("Ann"));
    assert_eq!(bob.get("username").unwrap(), Value::from("Bob"));
    assert!(!ann.is_deleted());
    assert_eq!(usernames(&users.get_all().unwrap()), vec!["Ann"]);
}

fn concurrent_creates_get_distinct_keys(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|thread| {
            let users = users.clone();
            std::thread::spawn(move || {
                (0..10)
                    .map(|i| {
                        let user = users
                            .create([("username", format!("user-{}-{}", thread, i))])
                            .unwrap();
                        user.get("id").unwrap().as_i64().unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        let created = handle.join().unwrap();
        assert!(created.windows(2).all(|pair| pair[0] < pair[1]));
        ids.extend(created);
    }
    ids.sort();
    assert_eq!(ids, (1..=40).collect::<Vec<i64>>());
    assert_eq!(users.get_all().unwrap().len(), 40);
}

fn deleted_objects_release_values(driver: &str) {
    let backend = TestBackend::open(driver);
    let users = backend.manager.record_model(user_model()).unwrap();
    let user = users
        .create([("username", "Kredh"), ("password", "fore123")])
        .unwrap();
    users.delete(&user).unwrap();

    assert!(user.is_deleted());
    assert!(matches!(user.get("username").unwrap_err(), Error::ObjectNotFound { .. }));
    assert!(matches!(user.values().unwrap_err(), Error::ObjectNotFound { .. }));
    assert!(matches!(
        user.set("username", "x").unwrap_err(),
        Error::UpdateDeletedObject { .. }
    ));
}

backend_tests!(
    create_and_find_share_instance,
    query_by_username,
    comparison_and_connectors,
    query_rejects_bad_filters,
    primary_key_update_rekeys,
    duplicate_key_conflicts,
    auto_increment_survives_reopen,
    deleted_objects_refuse_updates,
    defaults_fill_missing_fields,
    create_validates_values,
    update_persists_across_reopen,
    clear_removes_everything,
    not_equal_includes_null_fields,
    contains_matches_literal_text,
    handles_from_another_manager_are_refused,
    concurrent_creates_get_distinct_keys,
    deleted_objects_release_values,
);

#[test]
fn test_handles_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RepositoryManager>();
    assert_send_sync::<dataconn_core::Repository>();
    assert_send_sync::<Object>();
}

#[test]
fn test_unknown_driver() {
    let config = Configuration::for_driver("mongodb", "/tmp/nowhere");
    let err = RepositoryManager::connect(&config).unwrap_err();
    assert!(matches!(err, Error::DriverNotFound(name) if name == "mongodb"));
}

#[test]
fn test_missing_location() {
    let config = Configuration::new().with("driver", "yaml");
    let err = RepositoryManager::connect(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_yaml_file_layout() {
    let backend = TestBackend::open("yaml");
    let users = backend.manager.record_model(user_model()).unwrap();
    users
        .create([("username", "Kredh"), ("password", "fore123")])
        .unwrap();
    backend.manager.save().unwrap();

    let path = backend.dir.path().join("tables").join("users.yml");
    let text = std::fs::read_to_string(path).unwrap();
    let document: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    let elements = document.as_sequence().unwrap();
    assert_eq!(elements.len(), 2);
    assert_eq!(elements[0]["auto_increments"]["id"].as_i64(), Some(2));
    assert_eq!(elements[1]["username"].as_str(), Some("Kredh"));
    assert_eq!(elements[1]["id"].as_i64(), Some(1));
}
