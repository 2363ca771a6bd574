use docmodel::{memory::InMemoryStore, prelude::*};
use serde_json::json;

const SAMPLE_ID: &str = "52535efb0555c1353a75f54b";

fn database() -> Database {
    Database::new(InMemoryStore::new())
}

fn students(database: &Database) -> Model {
    database
        .model("students")
        .json_schema(json!({
            "firstName": { "type": "string", "required": true },
            "lastName": { "type": "string" },
            "age": "integer",
            "teacherId": "objectid",
        }))
        .build()
        .unwrap()
}

async fn create_one(model: &Model, document: Document) -> Document {
    model.create(document).await.unwrap().one().unwrap()
}

fn stamp(mut document: Document) -> Document {
    document.insert("formatted", true);
    document
}

#[tokio::test]
async fn created_documents_can_be_found_by_id() {
    let database = database();
    let students = students(&database);

    let created = create_one(&students, doc! { "firstName": "class", "lastName": "dojo" }).await;
    let id = created.get_str("_id").unwrap();
    assert!(is_object_id(&Bson::from(id)));

    let found = students.find_by_id(id).await.unwrap();
    assert_eq!(found, doc! { "_id": id, "firstName": "class", "lastName": "dojo" });
}

#[tokio::test]
async fn identifier_fields_round_trip_as_strings() {
    let database = database();
    let students = students(&database);

    let created = create_one(
        &students,
        doc! { "firstName": "class", "teacherId": SAMPLE_ID },
    )
    .await;
    assert_eq!(created.get_str("teacherId").unwrap(), SAMPLE_ID);

    let stored = database
        .backend()
        .find_documents(doc! {}, FindOptions::default(), "students")
        .await
        .unwrap();
    assert_eq!(
        stored[0].get_object_id("teacherId").unwrap(),
        ObjectId::parse_str(SAMPLE_ID).unwrap()
    );

    let by_teacher = students
        .find(doc! { "teacherId": SAMPLE_ID }, None)
        .await
        .unwrap();
    assert_eq!(by_teacher.len(), 1);
}

#[test]
fn recognizes_object_ids() {
    assert!(!Model::is_object_id(&Bson::from("1234123412341234")));
    assert!(Model::is_object_id(&Bson::from("521fc86d178a92165200001d")));
    assert!(Model::is_object_id(&Bson::ObjectId(ObjectId::new())));
    assert!(!Model::is_object_id(&Bson::Null));
    assert!(!Model::is_object_id(&Bson::Int32(12)));
}

#[tokio::test]
async fn string_ids_in_queries_match_native_ids() {
    let database = database();
    let plain = database.model("plain").build().unwrap();
    let oid = ObjectId::new();

    plain
        .create_with_no_validation(doc! { "_id": oid, "name": "native" })
        .await
        .unwrap();

    let found = plain.find(doc! { "_id": oid.to_hex() }, None).await.unwrap();
    assert_eq!(found, vec![doc! { "_id": oid.to_hex(), "name": "native" }]);
    assert_eq!(plain.count(doc! { "_id": oid.to_hex() }).await.unwrap(), 1);
}

#[tokio::test]
async fn required_fields_are_enforced_on_create() {
    let database = database();
    let students = students(&database);

    let err = students
        .create(doc! { "lastName": "dojo" })
        .await
        .unwrap_err();

    let errors = err.validation_errors().unwrap().errors();
    assert_eq!(errors[0].property, "firstName");
    assert_eq!(errors[0].message, "Property is required");
    assert_eq!(students.count(doc! {}).await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_batches_insert_nothing() {
    let database = database();
    let students = students(&database);

    let err = students
        .create(vec![
            doc! { "firstName": "class" },
            doc! { "firstName": "dojo", "age": "old" },
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::Validation(_)));
    assert_eq!(students.count(doc! {}).await.unwrap(), 0);

    let created = students
        .create(vec![doc! { "firstName": "class" }, doc! { "firstName": "dojo" }])
        .await
        .unwrap();
    assert!(created.is_many());
    assert_eq!(created.len(), 2);
    assert_eq!(students.count(doc! {}).await.unwrap(), 2);
}

#[tokio::test]
async fn empty_batches_are_a_no_op() {
    let database = database();
    let students = students(&database);

    let created = students.create(Vec::<Document>::new()).await.unwrap();
    assert_eq!(created, Documents::Many(Vec::new()));
}

#[tokio::test]
async fn update_requires_an_id() {
    let database = database();
    let students = students(&database);
    create_one(&students, doc! { "firstName": "class" }).await;

    let err = students
        .update(doc! { "lastName": "dodo" }, None)
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::MissingId(_)));
    assert!(err.to_string().contains("_id"));
    assert_eq!(students.count(doc! {}).await.unwrap(), 1);
}

#[tokio::test]
async fn update_of_a_missing_document_fails() {
    let database = database();
    let students = students(&database);

    let err = students
        .update(doc! { "_id": SAMPLE_ID, "lastName": "dodo" }, None)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("does not exist"));
    assert_eq!(students.count(doc! {}).await.unwrap(), 0);
    assert!(students.find_by_id(SAMPLE_ID).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn update_validates_only_present_fields() {
    let database = database();
    let students = students(&database);
    let created = create_one(&students, doc! { "firstName": "class", "lastName": "dojo" }).await;
    let id = created.get_str("_id").unwrap();

    let updated = students
        .update(doc! { "_id": id, "lastName": "dodo" }, None)
        .await
        .unwrap();
    assert_eq!(updated, doc! { "_id": id, "firstName": "class", "lastName": "dodo" });

    let err = students
        .update(doc! { "_id": id, "nonField": "aValue" }, None)
        .await
        .unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap().errors()[0].message,
        "Additional properties are not allowed"
    );

    let stored = students.find_by_id(id).await.unwrap();
    assert_eq!(stored, doc! { "_id": id, "firstName": "class", "lastName": "dodo" });
    assert!(!stored.contains_key("nonField"));

    let err = students
        .update(doc! { "_id": "nope", "lastName": "dodo" }, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidId(..)));
}

#[tokio::test]
async fn formatter_applies_to_reads_only() {
    let database = database();
    let students = database
        .model("students")
        .output_formatter(stamp)
        .build()
        .unwrap();

    let created = create_one(&students, doc! { "firstName": "class" }).await;
    assert_eq!(created.get_bool("formatted").unwrap(), true);
    let id = created.get_str("_id").unwrap().to_string();

    let found = students.find(doc! {}, None).await.unwrap();
    assert_eq!(found[0].get_bool("formatted").unwrap(), true);

    let one = students.find_one(doc! { "firstName": "class" }, None).await.unwrap();
    assert_eq!(one.get_bool("formatted").unwrap(), true);

    let by_id = students.find_by_id(id.as_str()).await.unwrap();
    assert_eq!(by_id.len(), 3);

    let by_ids = students.find_by_ids([id.as_str()]).await.unwrap();
    assert_eq!(by_ids[0].get_bool("formatted").unwrap(), true);

    let raw = students.find_with_no_validation(doc! {}, None).await.unwrap();
    assert!(!raw[0].contains_key("formatted"));

    let updated = students
        .update(doc! { "_id": id.as_str(), "lastName": "dojo" }, None)
        .await
        .unwrap();
    assert!(!updated.contains_key("formatted"));
}

#[tokio::test]
async fn find_one_reports_missing_documents() {
    let database = database();
    let students = students(&database);

    let err = students
        .find_one(doc! { "firstName": "nobody" }, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DocumentStoreError::NotFound { ref collection, .. } if collection == "students"
    ));
}

#[tokio::test]
async fn find_options_shape_results() {
    let database = database();
    let students = students(&database);
    students
        .create(vec![
            doc! { "firstName": "a", "age": 3 },
            doc! { "firstName": "b", "age": 1 },
            doc! { "firstName": "c", "age": 2 },
        ])
        .await
        .unwrap();

    let youngest = students
        .find(
            doc! {},
            FindOptions::builder()
                .sort("age", SortDirection::Asc)
                .limit(2)
                .build(),
        )
        .await
        .unwrap();

    let names = youngest
        .iter()
        .map(|document| document.get_str("firstName").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["b", "c"]);
}

#[tokio::test]
async fn unset_field_removes_only_that_field() {
    let database = database();
    let students = students(&database);
    let created = create_one(
        &students,
        doc! { "firstName": "class", "lastName": "dojo", "age": 3 },
    )
    .await;
    let id = created.get_str("_id").unwrap();

    students.unset_field(id, "lastName").await.unwrap();

    let found = students.find_by_id(id).await.unwrap();
    assert_eq!(found, doc! { "_id": id, "firstName": "class", "age": 3 });
}

#[tokio::test]
async fn unique_indexes_reject_duplicates() {
    let database = database();
    let students = students(&database);
    students
        .indices([IndexSpec::new(doc! { "firstName": 1 }).unique(true)])
        .await
        .unwrap();

    create_one(&students, doc! { "firstName": "class" }).await;
    let err = students
        .create(doc! { "firstName": "class" })
        .await
        .unwrap_err();

    assert!(err.is_duplicate_key());
    assert_eq!(students.count(doc! {}).await.unwrap(), 1);
}

#[tokio::test]
async fn lists_declared_indexes() {
    let database = database();
    let students = students(&database);
    create_one(&students, doc! { "firstName": "class" }).await;

    students
        .indexes([doc! { "firstName": 1 }, doc! { "lastName": -1 }])
        .await
        .unwrap();

    let names = students.list_indexes().await.unwrap();
    assert_eq!(names, vec!["_id_", "firstName_1", "lastName_-1"]);
}

#[tokio::test]
async fn models_without_a_database_fail() {
    let orphan = Model::new("students").unwrap();

    let err = orphan.find(doc! {}, None).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::NoDatabase(_)));
}

#[tokio::test]
async fn field_maps_strip_unknown_fields() {
    let database = database();
    let students = database
        .model("students")
        .schema(
            FieldMap::new()
                .required("name", FieldKind::String)
                .object_id("teacherId"),
        )
        .build()
        .unwrap();

    let created = create_one(
        &students,
        doc! { "_id": "ignored", "name": "class", "extra": 1, "teacherId": SAMPLE_ID },
    )
    .await;
    assert!(!created.contains_key("extra"));
    assert_ne!(created.get_str("_id").unwrap(), "ignored");
    assert_eq!(created.get_str("teacherId").unwrap(), SAMPLE_ID);

    let err = students
        .create(doc! { "name": "dojo", "teacherId": "not-an-id" })
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidIdField(ref field) if field == "teacherId"));

    let err = students.create(doc! { "extra": 1 }).await.unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap().errors()[0].message,
        "`name` is required"
    );
}

#[tokio::test]
async fn selector_updates() {
    let database = database();
    let students = students(&database);
    let created = students
        .create(vec![
            doc! { "firstName": "a", "age": 1 },
            doc! { "firstName": "b", "age": 1 },
            doc! { "firstName": "c", "age": 2 },
        ])
        .await
        .unwrap()
        .into_vec();
    let ids = created
        .iter()
        .take(2)
        .map(|document| document.get_str("_id").unwrap().to_string())
        .collect::<Vec<_>>();

    students
        .update_by_ids(ids, doc! { "lastName": "dojo" }, None)
        .await
        .unwrap();
    assert_eq!(students.count(doc! { "lastName": "dojo" }).await.unwrap(), 2);

    students
        .update_with_selector(doc! { "age": 1 }, doc! { "age": 5 }, None)
        .await
        .unwrap();
    assert_eq!(students.count(doc! { "age": 5 }).await.unwrap(), 2);

    let err = students
        .update_with_selector(doc! { "age": 5 }, doc! { "age": "five" }, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Validation(_)));

    let result = students
        .update_with_selector_no_validation(doc! { "age": 5 }, doc! { "age": "five" }, None)
        .await
        .unwrap();
    assert_eq!(result.matched_count, 2);
    assert_eq!(result.modified_count, 2);

    let result = students
        .update_with_selector_no_validation(
            doc! { "age": 2 },
            doc! { "lastName": "dodo" },
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(result.matched_count, 1);
}

#[tokio::test]
async fn find_and_modify_returns_the_updated_document() {
    let database = database();
    let students = students(&database);
    create_one(&students, doc! { "firstName": "class", "age": 1 }).await;

    let modified = students
        .find_and_modify(doc! { "firstName": "class" }, doc! { "$inc": { "age": 1 } }, None)
        .await
        .unwrap();
    assert_eq!(modified.get_i32("age").unwrap(), 2);
    assert!(modified.get_str("_id").is_ok());

    let err = students
        .find_and_modify(doc! { "firstName": "nobody" }, doc! { "$set": { "age": 1 } }, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::NotFound { .. }));

    let upserted = students
        .find_and_modify(
            doc! { "firstName": "nobody" },
            doc! { "$set": { "age": 9 } },
            FindAndModifyOptions::default().with_upsert(true),
        )
        .await
        .unwrap();
    assert_eq!(upserted.get_str("firstName").unwrap(), "nobody");
    assert_eq!(students.count(doc! {}).await.unwrap(), 2);
}

#[tokio::test]
async fn removes_documents() {
    let database = database();
    let students = students(&database);
    let created = students
        .create(vec![
            doc! { "firstName": "a" },
            doc! { "firstName": "b" },
            doc! { "firstName": "c" },
        ])
        .await
        .unwrap()
        .into_vec();

    students
        .remove_by_id(created[0].get_str("_id").unwrap())
        .await
        .unwrap();
    assert_eq!(students.count(doc! {}).await.unwrap(), 2);

    students.remove(doc! { "firstName": "b" }).await.unwrap();
    assert_eq!(students.count(doc! {}).await.unwrap(), 1);

    let remaining = students
        .find_by_ids([
            created[1].get_str("_id").unwrap(),
            created[2].get_str("_id").unwrap(),
        ])
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].get_str("firstName").unwrap(), "c");
}

#[tokio::test]
async fn typed_documents_round_trip() {
    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Student {
        first_name: String,
        last_name: Option<String>,
    }

    let database = database();
    let students = students(&database);
    let student = Student {
        first_name: "class".into(),
        last_name: Some("dojo".into()),
    };

    let mut created = create_one(&students, to_document(&student).unwrap()).await;
    created.remove("_id");

    assert_eq!(from_document::<Student>(created).unwrap(), student);
}

#[tokio::test]
async fn database_handles_share_one_backend() {
    let database = database();
    let students = students(&database);
    let again = students.database().unwrap().clone();

    assert!(database.same_backend(&again));

    drop(students);
    drop(again);
    database.shutdown().await.unwrap();
}

#[tokio::test]
async fn raw_byte_identifiers_round_trip() {
    let database = database();
    let students = students(&database);
    let native = ObjectId::from_bytes(*b"abcdefghijkl");

    let created = create_one(
        &students,
        doc! { "_id": "abcdefghijkl", "firstName": "class", "teacherId": "abcdefghijkl" },
    )
    .await;
    assert_eq!(created.get_str("_id").unwrap(), native.to_hex());

    let stored = database
        .backend()
        .find_documents(doc! {}, FindOptions::default(), "students")
        .await
        .unwrap();
    assert_eq!(stored[0].get_object_id("_id").unwrap(), native);
    assert_eq!(stored[0].get_object_id("teacherId").unwrap(), native);

    let by_raw = students.find_by_id("abcdefghijkl").await.unwrap();
    assert_eq!(by_raw, created);
    assert_eq!(students.find_by_id(native.to_hex()).await.unwrap(), created);
}

#[tokio::test]
async fn update_without_fields_returns_the_stored_document() {
    let database = database();
    let students = students(&database);
    let created = create_one(&students, doc! { "firstName": "class" }).await;
    let id = created.get_str("_id").unwrap();

    let unchanged = students.update(doc! { "_id": id }, None).await.unwrap();
    assert_eq!(unchanged, created);

    let err = students
        .update(doc! { "_id": SAMPLE_ID }, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

async fn seeded_students(database: &Database) -> Model {
    let students = students(database);
    students
        .create_with_no_validation(vec![
            doc! {
                "_id": ObjectId::parse_str("52535efb0555c1353a75f54b").unwrap(),
                "firstName": "class",
                "lastName": "dojo",
            },
            doc! {
                "_id": ObjectId::parse_str("52535efb0555c1353a75f54c").unwrap(),
                "firstName": "crass",
                "lastName": "mojo",
            },
        ])
        .await
        .unwrap();
    students
}

#[tokio::test]
async fn ensure_returns_an_existing_document() {
    let database = database();
    let students = seeded_students(&database).await;

    let ensured = students
        .ensure(doc! { "firstName": "class", "lastName": "dojo" }, None)
        .await
        .unwrap();

    assert_eq!(
        ensured,
        doc! { "_id": "52535efb0555c1353a75f54b", "firstName": "class", "lastName": "dojo" }
    );
    assert_eq!(students.count(doc! {}).await.unwrap(), 2);
}

#[tokio::test]
async fn ensure_creates_a_missing_document() {
    let database = database();
    let students = seeded_students(&database).await;

    let mut ensured = students
        .ensure(doc! { "firstName": "school", "lastName": "dojo" }, None)
        .await
        .unwrap();
    assert!(Model::is_object_id(ensured.get("_id").unwrap()));
    ensured.remove("_id");
    assert_eq!(ensured, doc! { "firstName": "school", "lastName": "dojo" });

    let mut extended = students
        .ensure(doc! { "firstName": "academy" }, doc! { "lastName": "dojo" })
        .await
        .unwrap();
    assert!(Model::is_object_id(extended.get("_id").unwrap()));
    extended.remove("_id");
    assert_eq!(extended, doc! { "firstName": "academy", "lastName": "dojo" });

    assert_eq!(students.count(doc! {}).await.unwrap(), 4);
}

#[tokio::test]
async fn ensure_rejects_undeclared_fields() {
    let database = database();
    let students = seeded_students(&database).await;

    let err = students
        .ensure(
            doc! { "firstName": "school", "lastName": "dojo" },
            doc! { "firstName": "school", "lastName": "dojo", "zoobuddydoo": true },
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.validation_errors().unwrap().errors()[0].message,
        "Additional properties are not allowed"
    );
    assert_eq!(students.count(doc! {}).await.unwrap(), 2);
}

#[tokio::test]
async fn upsert_updates_a_matching_document() {
    let database = database();
    let students = seeded_students(&database).await;

    let mut upserted = students
        .upsert(
            doc! { "firstName": "class", "lastName": "dojo" },
            doc! { "firstName": "school", "lastName": "dojo" },
        )
        .await
        .unwrap();

    assert_eq!(upserted.remove("_id"), Some(Bson::from("52535efb0555c1353a75f54b")));
    assert_eq!(upserted, doc! { "firstName": "school", "lastName": "dojo" });
    assert_eq!(students.count(doc! {}).await.unwrap(), 2);
}

#[tokio::test]
async fn upsert_inserts_when_nothing_matches() {
    let database = database();
    let students = seeded_students(&database).await;

    let mut upserted = students
        .upsert(
            doc! { "firstName": "school", "lastName": "dojo" },
            doc! { "firstName": "school", "lastName": "dojo" },
        )
        .await
        .unwrap();

    assert!(Model::is_object_id(upserted.get("_id").unwrap()));
    upserted.remove("_id");
    assert_eq!(upserted, doc! { "firstName": "school", "lastName": "dojo" });
    assert_eq!(students.count(doc! {}).await.unwrap(), 3);
}

#[tokio::test]
async fn upsert_rejects_undeclared_fields() {
    let database = database();
    let students = seeded_students(&database).await;

    let err = students
        .upsert(
            doc! { "firstName": "school", "lastName": "dojo" },
            doc! { "firstName": "school", "lastName": "dojo", "zoobuddydoo": true },
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.validation_errors().unwrap().errors()[0].message,
        "Additional properties are not allowed"
    );
    assert_eq!(students.count(doc! {}).await.unwrap(), 2);

    let err = students
        .upsert(doc! { "firstName": "school" }, doc! {})
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
}
