//! End-to-end: unique properties, non-internal ids and versions.

mod common;

use common::*;
use graph_ogm::mapping::SequenceIdGenerator;
use graph_ogm::{EntityRef, Error, GraphStore, Mapper, MappingConfig, MappingPolicy, MemoryStore, Value};

#[test]
fn test_unique_property_get_or_create() {
    let mapper = mapper();
    let first = account(Some("ada@example.com"), "Ada");
    let second = account(Some("ada@example.com"), "Ada L.");

    let a = mapper.convert_to_graph(&first, MappingPolicy::DEFAULT).unwrap();
    let b = mapper.convert_to_graph(&second, MappingPolicy::DEFAULT).unwrap();

    assert_eq!(a.element_id(), b.element_id());
    assert_eq!(mapper.store().node_count().unwrap(), 1);
    assert_eq!(b.property("display_name"), Some(&Value::from("Ada L.")));
    assert_eq!(first.downcast::<Account>().unwrap().id, second.downcast::<Account>().unwrap().id);
}

#[test]
fn test_null_unique_value_is_rejected() {
    let mapper = mapper();
    let err = mapper.convert_to_graph(&account(None, "Nobody"), MappingPolicy::DEFAULT).unwrap_err();
    assert!(matches!(
        err,
        Error::MissingUniqueValue { ref entity, ref property } if entity == "Account" && property == "email"
    ));
    assert_eq!(mapper.store().node_count().unwrap(), 0);
}

#[test]
fn test_concurrent_get_or_create_has_one_winner() {
    let mapper = mapper();
    let ids: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let mapper = &mapper;
                scope.spawn(move || {
                    let object = account(Some("race@example.com"), &format!("writer {i}"));
                    mapper.identity().resolve_or_create(&object, None).unwrap().element_id()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(mapper.store().node_count().unwrap(), 1);
}

#[test]
fn test_version_increments_on_each_write() {
    let mapper = mapper();
    let acct = account(Some("v@example.com"), "V");
    let stored = mapper.convert_to_graph(&acct, MappingPolicy::DEFAULT).unwrap();
    assert_eq!(acct.downcast::<Account>().unwrap().version, Some(1));
    assert_eq!(stored.property("version"), Some(&Value::Int(1)));

    let stored = mapper.convert_to_graph(&acct, MappingPolicy::DEFAULT).unwrap();
    assert_eq!(acct.downcast::<Account>().unwrap().version, Some(2));
    assert_eq!(stored.property("version"), Some(&Value::Int(2)));
}

#[test]
fn test_stale_version_is_rejected() {
    let mapper = mapper();
    let acct = account(Some("stale@example.com"), "Original");
    let stored = mapper.convert_to_graph(&acct, MappingPolicy::DEFAULT).unwrap();

    let stale = mapper.load(stored.element_id(), "Account").unwrap().unwrap();
    assert_eq!(stale.downcast::<Account>().unwrap().version, Some(1));

    acct.downcast_mut::<Account>().unwrap().display_name = "Fresh".into();
    mapper.convert_to_graph(&acct, MappingPolicy::DEFAULT).unwrap();

    stale.downcast_mut::<Account>().unwrap().display_name = "Stale".into();
    let err = mapper.convert_to_graph(&stale, MappingPolicy::DEFAULT).unwrap_err();
    assert!(matches!(
        err,
        Error::ConcurrentModification { ref expected, ref actual, .. } if expected == "1" && actual == "2"
    ));
    let current = mapper.store().get_element(stored.element_id()).unwrap().unwrap();
    assert_eq!(current.property("display_name"), Some(&Value::from("Fresh")));
}

#[test]
fn test_changed_unique_value_moves_with_the_node() {
    let mapper = mapper();
    let acct = account(Some("a@example.com"), "A");
    let stored = mapper.convert_to_graph(&acct, MappingPolicy::DEFAULT).unwrap();

    acct.downcast_mut::<Account>().unwrap().email = Some("b@example.com".into());
    let renamed = mapper.convert_to_graph(&acct, MappingPolicy::DEFAULT).unwrap();
    assert_eq!(renamed.element_id(), stored.element_id());
    assert_eq!(renamed.property("email"), Some(&Value::from("b@example.com")));

    // The new value resolves to the renamed node, the old one is free again.
    let same = mapper.convert_to_graph(&account(Some("b@example.com"), "B"), MappingPolicy::DEFAULT).unwrap();
    assert_eq!(same.element_id(), stored.element_id());
    let fresh = mapper.convert_to_graph(&account(Some("a@example.com"), "A2"), MappingPolicy::DEFAULT).unwrap();
    assert_ne!(fresh.element_id(), stored.element_id());
    assert_eq!(fresh.property("email"), Some(&Value::from("a@example.com")));
    assert_eq!(mapper.store().node_count().unwrap(), 2);

    let renamed = mapper.store().get_element(stored.element_id()).unwrap().unwrap();
    assert_eq!(renamed.property("display_name"), Some(&Value::from("B")));
}

#[test]
fn test_unique_value_taken_by_another_node_is_rejected() {
    let mapper = mapper();
    let a = account(Some("a@example.com"), "A");
    let b = account(Some("b@example.com"), "B");
    let a_node = mapper.convert_to_graph(&a, MappingPolicy::DEFAULT).unwrap();
    let b_node = mapper.convert_to_graph(&b, MappingPolicy::DEFAULT).unwrap();

    {
        let mut b = b.downcast_mut::<Account>().unwrap();
        b.email = Some("a@example.com".into());
        b.display_name = "B renamed".into();
    }
    let err = mapper.convert_to_graph(&b, MappingPolicy::DEFAULT).unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));

    let current = mapper.store().get_element(b_node.element_id()).unwrap().unwrap();
    assert_eq!(current.property("email"), Some(&Value::from("b@example.com")));
    assert_eq!(current.property("display_name"), Some(&Value::from("B")));
    assert_eq!(current.property("version"), Some(&Value::Int(1)));

    // Both values still resolve to their own node.
    let again = mapper.convert_to_graph(&account(Some("a@example.com"), "A"), MappingPolicy::DEFAULT).unwrap();
    assert_eq!(again.element_id(), a_node.element_id());
    let again = mapper.convert_to_graph(&account(Some("b@example.com"), "B"), MappingPolicy::DEFAULT).unwrap();
    assert_eq!(again.element_id(), b_node.element_id());
    assert_eq!(mapper.store().node_count().unwrap(), 2);
}

#[test]
fn test_is_new() {
    let mapper = mapper();
    let ada = person("Ada", 36);
    assert_eq!(mapper.identity().is_new(&ada).unwrap(), Some(true));
    mapper.convert_to_graph(&ada, MappingPolicy::DEFAULT).unwrap();
    assert_eq!(mapper.identity().is_new(&ada).unwrap(), Some(false));

    // Assigned id without a version property cannot be told apart.
    let tag = EntityRef::new(Tag { name: Some("rust".into()), color: None });
    assert_eq!(mapper.identity().is_new(&tag).unwrap(), None);
}

#[test]
fn test_assigned_id_get_or_create() {
    let mapper = mapper();
    let first = EntityRef::new(Tag { name: Some("rust".into()), color: Some("orange".into()) });
    let second = EntityRef::new(Tag { name: Some("rust".into()), color: None });

    let a = mapper.convert_to_graph(&first, MappingPolicy::DEFAULT).unwrap();
    let b = mapper.convert_to_graph(&second, MappingPolicy::DEFAULT).unwrap();
    assert_eq!(a.element_id(), b.element_id());
    assert_eq!(mapper.store().node_count().unwrap(), 1);
    assert_eq!(b.property("color"), None);

    let back = mapper.convert_to_object(&b, "Tag", MappingPolicy::DEFAULT).unwrap().unwrap();
    assert_eq!(back.downcast::<Tag>().unwrap().name.as_deref(), Some("rust"));
    assert_eq!(mapper.identity().element_id(&back).unwrap(), Some(b.element_id()));
}

#[test]
fn test_assigned_id_must_be_set() {
    let mapper = mapper();
    let err = mapper
        .convert_to_graph(&EntityRef::new(Tag::default()), MappingPolicy::DEFAULT)
        .unwrap_err();
    assert!(matches!(err, Error::MissingUniqueValue { ref property, .. } if property == "name"));
}

#[test]
fn test_external_id_is_generated_once() {
    let mapper = mapper();
    let ticket = EntityRef::new(Ticket { id: None, summary: "crash on start".into() });

    let first = mapper.convert_to_graph(&ticket, MappingPolicy::DEFAULT).unwrap();
    let id = ticket.downcast::<Ticket>().unwrap().id;
    assert_eq!(id, Some(1));
    assert_eq!(first.property("id"), Some(&Value::Int(1)));

    let second = mapper.convert_to_graph(&ticket, MappingPolicy::DEFAULT).unwrap();
    assert_eq!(first.element_id(), second.element_id());
    assert_eq!(ticket.downcast::<Ticket>().unwrap().id, Some(1));
}

#[test]
fn test_custom_id_generator() {
    let mapper = Mapper::new(MemoryStore::new(), MappingConfig::default())
        .with_id_generator(SequenceIdGenerator::starting_at(100));
    mapper.register::<Ticket>().unwrap();

    let a = EntityRef::new(Ticket { id: None, summary: "a".into() });
    let b = EntityRef::new(Ticket { id: None, summary: "b".into() });
    mapper.convert_to_graph(&a, MappingPolicy::DEFAULT).unwrap();
    mapper.convert_to_graph(&b, MappingPolicy::DEFAULT).unwrap();
    assert_eq!(a.downcast::<Ticket>().unwrap().id, Some(100));
    assert_eq!(b.downcast::<Ticket>().unwrap().id, Some(101));
    assert_eq!(mapper.store().node_count().unwrap(), 2);
}
