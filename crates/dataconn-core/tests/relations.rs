//! Relation engine scenarios, run against every driver.

#[macro_use]
mod common;

use common::{group_and_user, TestBackend};
use dataconn_core::{Error, FieldDef, ModelDef, Object, Repository, Value};

fn names(objects: &[Object], field: &str) -> Vec<String> {
    objects
        .iter()
        .map(|o| o.get(field).unwrap().as_str().unwrap().to_string())
        .collect()
}

fn groups_and_users(backend: &TestBackend) -> (Repository, Repository) {
    let mut repositories = backend.manager.record_models(group_and_user()).unwrap();
    let users = repositories.pop().unwrap();
    let groups = repositories.pop().unwrap();
    (groups, users)
}

fn push_sets_foreign_key(driver: &str) {
    let backend = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.create([("name", "admins")]).unwrap();
    let kredh = users.create([("username", "Kredh")]).unwrap();

    assert!(admins.many("users").is_empty().unwrap());
    admins.many("users").push(&kredh).unwrap();

    assert_eq!(kredh.get("group_id").unwrap(), admins.get("id").unwrap());
    assert!(kredh.get_one("group").unwrap().unwrap().is(&admins));
    assert!(admins.many("users").contains(&kredh).unwrap());
}

fn set_one_moves_between_collections(driver: &str) {
    let backend = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.create([("name", "admins")]).unwrap();
    let guests = groups.create([("name", "guests")]).unwrap();
    let kredh = users.create([("username", "Kredh")]).unwrap();

    // Load both collections before the move.
    assert_eq!(admins.many("users").len().unwrap(), 0);
    assert_eq!(guests.many("users").len().unwrap(), 0);

    kredh.set_one("group", Some(&admins)).unwrap();
    assert_eq!(names(&admins.many("users").list().unwrap(), "username"), vec!["Kredh"]);

    kredh.set_one("group", Some(&guests)).unwrap();
    assert!(admins.many("users").is_empty().unwrap());
    assert_eq!(names(&guests.many("users").list().unwrap(), "username"), vec!["Kredh"]);

    kredh.set_one("group", None).unwrap();
    assert!(guests.many("users").is_empty().unwrap());
    assert_eq!(kredh.get("group_id").unwrap(), Value::Null);
    assert!(kredh.get_one("group").unwrap().is_none());
}

fn setting_foreign_key_scalar_moves_member(driver: &str) {
    let backend = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.create([("name", "admins")]).unwrap();
    let kredh = users.create([("username", "Kredh")]).unwrap();
    assert!(admins.many("users").is_empty().unwrap());

    kredh.set("group_id", admins.get("id").unwrap()).unwrap();
    assert!(admins.many("users").contains(&kredh).unwrap());
}

fn create_with_foreign_key_joins_collection(driver: &str) {
    let backend = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.create([("name", "admins")]).unwrap();
    assert!(admins.many("users").is_empty().unwrap());

    let kredh = users
        .create([("username", Value::from("Kredh")), ("group_id", admins.get("id").unwrap())])
        .unwrap();
    assert!(admins.many("users").contains(&kredh).unwrap());
}

fn remove_clears_foreign_key(driver: &str) {
    let backend = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.create([("name", "admins")]).unwrap();
    let kredh = users.create([("username", "Kredh")]).unwrap();
    let nitrate = users.create([("username", "Nitrate")]).unwrap();
    admins.many("users").push(&kredh).unwrap();

    assert!(!admins.many("users").remove(&nitrate).unwrap());
    assert!(admins.many("users").remove(&kredh).unwrap());
    assert_eq!(kredh.get("group_id").unwrap(), Value::Null);
    assert!(admins.many("users").is_empty().unwrap());
}

fn insert_set_and_replace(driver: &str) {
    let backend = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.create([("name", "admins")]).unwrap();
    let ann = users.create([("username", "Ann")]).unwrap();
    let bob = users.create([("username", "Bob")]).unwrap();
    let cyd = users.create([("username", "Cyd")]).unwrap();
    let members = admins.many("users");

    members.push(&ann).unwrap();
    members.insert(0, &bob).unwrap();
    assert_eq!(names(&members.list().unwrap(), "username"), vec!["Bob", "Ann"]);

    let replaced = members.set(1, &cyd).unwrap();
    assert!(replaced.is(&ann));
    assert_eq!(names(&members.list().unwrap(), "username"), vec!["Bob", "Cyd"]);
    assert_eq!(ann.get("group_id").unwrap(), Value::Null);
    assert!(matches!(members.set(5, &ann).unwrap_err(), Error::Usage(_)));

    members.replace(&[ann.clone(), bob.clone()]).unwrap();
    assert_eq!(names(&members.list().unwrap(), "username"), vec!["Ann", "Bob"]);
    assert_eq!(cyd.get("group_id").unwrap(), Value::Null);
    assert!(bob.get_one("group").unwrap().unwrap().is(&admins));
}

fn delete_owner_orphans_members(driver: &str) {
    let backend = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.create([("name", "admins")]).unwrap();
    let kredh = users.create([("username", "Kredh")]).unwrap();
    admins.many("users").push(&kredh).unwrap();

    groups.delete(&admins).unwrap();
    assert_eq!(kredh.get("group_id").unwrap(), Value::Null);
    assert!(!kredh.is_deleted());
    assert!(kredh.get_one("group").unwrap().is_none());

    let stored = users.query().filter("group_id = ?", Value::Null).unwrap().execute().unwrap();
    assert_eq!(stored.len(), 1);
}

fn delete_member_leaves_collection(driver: &str) {
    let backend = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.create([("name", "admins")]).unwrap();
    let kredh = users.create([("username", "Kredh")]).unwrap();
    let nitrate = users.create([("username", "Nitrate")]).unwrap();
    admins.many("users").push(&kredh).unwrap();
    admins.many("users").push(&nitrate).unwrap();

    users.delete(&kredh).unwrap();
    assert_eq!(names(&admins.many("users").list().unwrap(), "username"), vec!["Nitrate"]);
    assert!(matches!(
        admins.many("users").push(&kredh).unwrap_err(),
        Error::UpdateDeletedObject { .. }
    ));
}

fn collections_reload_after_reopen(driver: &str) {
    let mut backend = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.create([("name", "admins")]).unwrap();
    for name in ["Ann", "Bob"] {
        let user = users.create([("username", name)]).unwrap();
        admins.many("users").push(&user).unwrap();
    }
    users.create([("username", "Cyd")]).unwrap();

    backend.reopen();
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.find(1).unwrap();
    let mut members = names(&admins.many("users").list().unwrap(), "username");
    members.sort();
    assert_eq!(members, vec!["Ann", "Bob"]);

    let ann = users.query().filter("username = ?", "Ann").unwrap().first().unwrap().unwrap();
    assert!(admins.many("users").contains(&ann).unwrap());
}

fn owner_key_change_follows_children(driver: &str) {
    let mut backend = TestBackend::open(driver);
    let models = || {
        vec![
            ModelDef::bare("Shelf")
                .with_field(FieldDef::string("code").pkey())
                .with_field(FieldDef::has_many("books", "Book")),
            ModelDef::new("Book")
                .with_field(FieldDef::string("title"))
                .with_field(FieldDef::has_one("shelf", "Shelf")),
        ]
    };
    let repositories = backend.manager.record_models(models()).unwrap();
    let (shelves, books) = (&repositories[0], &repositories[1]);
    let shelf = shelves.create([("code", "A1")]).unwrap();
    let book = books.create([("title", "Dune")]).unwrap();
    shelf.many("books").push(&book).unwrap();

    shelf.set("code", "B2").unwrap();
    assert_eq!(book.get("shelf_id").unwrap(), Value::from("B2"));

    backend.reopen();
    let repositories = backend.manager.record_models(models()).unwrap();
    let shelf = repositories[0].find("B2").unwrap();
    assert_eq!(names(&shelf.many("books").list().unwrap(), "title"), vec!["Dune"]);
}

fn belong_to_is_one_directional(driver: &str) {
    let backend = TestBackend::open(driver);
    let repositories = backend
        .manager
        .record_models(vec![
            ModelDef::new("Author")
                .with_field(FieldDef::string("name"))
                .with_field(FieldDef::has_many("posts", "Post")),
            ModelDef::new("Post")
                .with_field(FieldDef::string("title"))
                .with_field(FieldDef::belong_to("author", "Author")),
        ])
        .unwrap();
    let (authors, posts) = (&repositories[0], &repositories[1]);
    let author = authors.create([("name", "Herbert")]).unwrap();
    let post = posts.create([("title", "Dune")]).unwrap();

    author.many("posts").push(&post).unwrap();
    assert_eq!(post.get("author_id").unwrap(), author.get("id").unwrap());
    assert!(matches!(post.get_one("author").unwrap_err(), Error::Usage(_)));
    assert!(matches!(
        post.set_one("author", Some(&author)).unwrap_err(),
        Error::Usage(_)
    ));
}

fn relation_misuse(driver: &str) {
    let backend = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&backend);
    let admins = groups.create([("name", "admins")]).unwrap();
    let other = groups.create([("name", "others")]).unwrap();
    let kredh = users.create([("username", "Kredh")]).unwrap();

    assert!(matches!(admins.get("users").unwrap_err(), Error::Usage(_)));
    assert!(matches!(kredh.set("group", 1).unwrap_err(), Error::Usage(_)));
    assert!(matches!(
        admins.many("users").push(&other).unwrap_err(),
        Error::Usage(_)
    ));
    assert!(matches!(
        kredh.set_one("group", Some(&kredh)).unwrap_err(),
        Error::Usage(_)
    ));
    assert!(matches!(
        users.create([("group", Value::from(1))]).unwrap_err(),
        Error::Usage(_)
    ));
    assert!(matches!(
        kredh.many("group").list().unwrap_err(),
        Error::Usage(_)
    ));
}

fn relations_refuse_foreign_handles(driver: &str) {
    let first = TestBackend::open(driver);
    let second = TestBackend::open(driver);
    let (groups, users) = groups_and_users(&first);
    let (other_groups, other_users) = groups_and_users(&second);
    let admins = groups.create([("name", "admins")]).unwrap();
    let kredh = users.create([("username", "Kredh")]).unwrap();
    let guests = other_groups.create([("name", "guests")]).unwrap();
    let stranger = other_users.create([("username", "Stranger")]).unwrap();

    let usage = |err: Error| assert!(matches!(err, Error::Usage(_)), "{:?}", err);
    usage(kredh.set_one("group", Some(&guests)).unwrap_err());
    let members = admins.many("users");
    usage(members.push(&stranger).unwrap_err());
    usage(members.insert(0, &stranger).unwrap_err());
    usage(members.remove(&stranger).unwrap_err());
    usage(members.contains(&stranger).unwrap_err());
    usage(members.replace(&[kredh.clone(), stranger.clone()]).unwrap_err());

    members.push(&kredh).unwrap();
    usage(members.set(0, &stranger).unwrap_err());

    assert_eq!(names(&members.list().unwrap(), "username"), vec!["Kredh"]);
    assert!(kredh.get_one("group").unwrap().unwrap().is(&admins));
    assert_eq!(stranger.get("group_id").unwrap(), Value::Null);
    assert!(guests.many("users").is_empty().unwrap());
}

backend_tests!(
    push_sets_foreign_key,
    set_one_moves_between_collections,
    setting_foreign_key_scalar_moves_member,
    create_with_foreign_key_joins_collection,
    remove_clears_foreign_key,
    insert_set_and_replace,
    delete_owner_orphans_members,
    delete_member_leaves_collection,
    collections_reload_after_reopen,
    owner_key_change_follows_children,
    belong_to_is_one_directional,
    relation_misuse,
    relations_refuse_foreign_handles,
);
