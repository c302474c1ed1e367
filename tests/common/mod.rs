//! Domain fixtures shared by the end-to-end tests.
//!
//! ```text
//! Person -[best_friend]-> Person      (eager, single)
//! Person -[friends]->     Person      (on demand)
//! Person -[ACTS_IN]->     Movie       (through the Role relationship entity)
//! Animal <- Dog, Cat                  (abstract hierarchy, shared `Animal.name` key)
//! Account                             (unique email, version)
//! Tag / Ticket                        (assigned / external ids)
//! Link                                (relationship entity typed by a field)
//! ```

#![allow(dead_code)]

use std::any::Any;

use graph_ogm::mapping::{Association, NodeTypeStrategy};
use graph_ogm::{
    AccessError, DomainObject, Entity, EntityDeclaration, EntityRef, FieldDeclaration as F,
    FieldValue, IdStrategy, Mapper, MappingConfig, MemoryStore, ValueType,
};

macro_rules! any_impls {
    () => {
        fn as_any(&self) -> &dyn Any { self }
        fn as_any_mut(&mut self) -> &mut dyn Any { self }
    };
}

fn unknown<T>(field: &str) -> Result<T, AccessError> {
    Err(AccessError::UnknownField(field.to_string()))
}

// ============================================================================
// Person
// ============================================================================

#[derive(Debug, Default)]
pub struct Person {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub age: i64,
    pub nickname: Option<String>,
    pub best_friend: Association,
    pub friends: Association,
    pub roles: Association,
    /// Transient; counts writes that went through the accessor path.
    pub accessor_writes: usize,
}

impl DomainObject for Person {
    fn entity_name(&self) -> &str { "Person" }

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
        Ok(match field {
            "id" => self.id.into(),
            "name" => self.name.clone().into(),
            "age" => self.age.into(),
            "nickname" => self.nickname.clone().into(),
            "best_friend" => self.best_friend.clone().into(),
            "friends" => self.friends.clone().into(),
            "roles" => self.roles.clone().into(),
            "accessor_writes" => (self.accessor_writes as i64).into(),
            other => return unknown(other),
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        match field {
            "id" => self.id = value.try_into()?,
            "name" => self.name = value.try_into()?,
            "age" => self.age = value.try_into()?,
            "nickname" => self.nickname = value.try_into()?,
            "best_friend" => self.best_friend = value.try_into()?,
            "friends" => self.friends = value.try_into()?,
            "roles" => self.roles = value.try_into()?,
            other => return unknown(other),
        }
        Ok(())
    }

    fn set_property(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        self.accessor_writes += 1;
        self.set_field(field, value)
    }

    any_impls!();
}

impl Entity for Person {
    fn declaration() -> EntityDeclaration {
        EntityDeclaration::node("Person")
            .field(F::id("id"))
            .field(F::property("name", ValueType::String))
            .field(F::property("age", ValueType::Int))
            .field(F::property("nickname", ValueType::String).nullable())
            .field(F::related_to("best_friend", "Person").single().eager())
            .field(F::related_to("friends", "Person"))
            .field(F::related_via("roles", "Role"))
            .field(F::transient("accessor_writes"))
    }
}

pub fn person(name: &str, age: i64) -> EntityRef {
    EntityRef::new(Person { name: Some(name.to_string()), age, ..Person::default() })
}

pub fn name_of(person: &EntityRef) -> String {
    person.downcast::<Person>().and_then(|p| p.name.clone()).unwrap_or_default()
}

pub fn friends_of(person: &EntityRef) -> Vec<EntityRef> {
    person.downcast::<Person>().map(|p| p.friends.entities().to_vec()).unwrap_or_default()
}

pub fn best_friend_of(person: &EntityRef) -> Option<EntityRef> {
    person.downcast::<Person>().and_then(|p| p.best_friend.single().cloned())
}

// ============================================================================
// Movie + Role
// ============================================================================

#[derive(Debug, Default)]
pub struct Movie {
    pub id: Option<i64>,
    pub title: String,
    pub released: Option<i64>,
}

impl DomainObject for Movie {
    fn entity_name(&self) -> &str { "Movie" }

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
        Ok(match field {
            "id" => self.id.into(),
            "title" => self.title.clone().into(),
            "released" => self.released.into(),
            other => return unknown(other),
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        match field {
            "id" => self.id = value.try_into()?,
            "title" => self.title = value.try_into()?,
            "released" => self.released = value.try_into()?,
            other => return unknown(other),
        }
        Ok(())
    }

    any_impls!();
}

impl Entity for Movie {
    fn declaration() -> EntityDeclaration {
        EntityDeclaration::node("Movie")
            .field(F::id("id"))
            .field(F::property("title", ValueType::String).indexed(None))
            .field(F::property("released", ValueType::Int).nullable())
    }
}

pub fn movie(title: &str, released: i64) -> EntityRef {
    EntityRef::new(Movie { title: title.to_string(), released: Some(released), ..Movie::default() })
}

#[derive(Debug, Default)]
pub struct Role {
    pub id: Option<i64>,
    pub actor: Association,
    pub movie: Association,
    pub character: Option<String>,
}

impl DomainObject for Role {
    fn entity_name(&self) -> &str { "Role" }

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
        Ok(match field {
            "id" => self.id.into(),
            "actor" => self.actor.clone().into(),
            "movie" => self.movie.clone().into(),
            "character" => self.character.clone().into(),
            other => return unknown(other),
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        match field {
            "id" => self.id = value.try_into()?,
            "actor" => self.actor = value.try_into()?,
            "movie" => self.movie = value.try_into()?,
            "character" => self.character = value.try_into()?,
            other => return unknown(other),
        }
        Ok(())
    }

    any_impls!();
}

impl Entity for Role {
    fn declaration() -> EntityDeclaration {
        EntityDeclaration::relationship("Role")
            .relationship_type("ACTS_IN")
            .field(F::id("id"))
            .field(F::start_node("actor", "Person"))
            .field(F::end_node("movie", "Movie"))
            .field(F::property("character", ValueType::String).nullable())
    }
}

pub fn role(actor: &EntityRef, movie: &EntityRef, character: &str) -> EntityRef {
    EntityRef::new(Role {
        actor: Association::one(actor.clone()),
        movie: Association::one(movie.clone()),
        character: Some(character.to_string()),
        ..Role::default()
    })
}

/// Relationship entity whose type comes from its `kind` field.
#[derive(Debug, Default)]
pub struct Link {
    pub id: Option<i64>,
    pub from: Association,
    pub to: Association,
    pub kind: Option<String>,
}

impl DomainObject for Link {
    fn entity_name(&self) -> &str { "Link" }

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
        Ok(match field {
            "id" => self.id.into(),
            "from" => self.from.clone().into(),
            "to" => self.to.clone().into(),
            "kind" => self.kind.clone().into(),
            other => return unknown(other),
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        match field {
            "id" => self.id = value.try_into()?,
            "from" => self.from = value.try_into()?,
            "to" => self.to = value.try_into()?,
            "kind" => self.kind = value.try_into()?,
            other => return unknown(other),
        }
        Ok(())
    }

    any_impls!();
}

impl Entity for Link {
    fn declaration() -> EntityDeclaration {
        EntityDeclaration::relationship("Link")
            .field(F::id("id"))
            .field(F::start_node("from", "Person"))
            .field(F::end_node("to", "Person"))
            .field(F::type_name("kind"))
    }
}

// ============================================================================
// Animal hierarchy
// ============================================================================

/// Abstract: registered by declaration only.
pub fn animal_declaration() -> EntityDeclaration {
    EntityDeclaration::node("Animal")
        .abstract_type()
        .short_names(false)
        .field(F::id("id"))
        .field(F::property("name", ValueType::String))
}

#[derive(Debug, Default)]
pub struct Dog {
    pub id: Option<i64>,
    pub name: String,
    pub breed: Option<String>,
}

impl DomainObject for Dog {
    fn entity_name(&self) -> &str { "Dog" }

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
        Ok(match field {
            "id" => self.id.into(),
            "name" => self.name.clone().into(),
            "breed" => self.breed.clone().into(),
            other => return unknown(other),
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        match field {
            "id" => self.id = value.try_into()?,
            "name" => self.name = value.try_into()?,
            "breed" => self.breed = value.try_into()?,
            other => return unknown(other),
        }
        Ok(())
    }

    any_impls!();
}

impl Entity for Dog {
    fn declaration() -> EntityDeclaration {
        EntityDeclaration::node("Dog").extends("Animal").field(F::property("breed", ValueType::String).nullable())
    }
}

#[derive(Debug, Default)]
pub struct Cat {
    pub id: Option<i64>,
    pub name: String,
    pub lives: i64,
}

impl DomainObject for Cat {
    fn entity_name(&self) -> &str { "Cat" }

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
        Ok(match field {
            "id" => self.id.into(),
            "name" => self.name.clone().into(),
            "lives" => self.lives.into(),
            other => return unknown(other),
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        match field {
            "id" => self.id = value.try_into()?,
            "name" => self.name = value.try_into()?,
            "lives" => self.lives = value.try_into()?,
            other => return unknown(other),
        }
        Ok(())
    }

    any_impls!();
}

impl Entity for Cat {
    fn declaration() -> EntityDeclaration {
        EntityDeclaration::node("Cat").extends("Animal").field(F::property("lives", ValueType::Int))
    }
}

pub fn dog(name: &str, breed: &str) -> EntityRef {
    EntityRef::new(Dog { id: None, name: name.to_string(), breed: Some(breed.to_string()) })
}

// ============================================================================
// Account (unique + version)
// ============================================================================

#[derive(Debug, Default)]
pub struct Account {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub display_name: String,
    pub version: Option<i64>,
}

impl DomainObject for Account {
    fn entity_name(&self) -> &str { "Account" }

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
        Ok(match field {
            "id" => self.id.into(),
            "email" => self.email.clone().into(),
            "display_name" => self.display_name.clone().into(),
            "version" => self.version.into(),
            other => return unknown(other),
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        match field {
            "id" => self.id = value.try_into()?,
            "email" => self.email = value.try_into()?,
            "display_name" => self.display_name = value.try_into()?,
            "version" => self.version = value.try_into()?,
            other => return unknown(other),
        }
        Ok(())
    }

    any_impls!();
}

impl Entity for Account {
    fn declaration() -> EntityDeclaration {
        EntityDeclaration::node("Account")
            .field(F::id("id"))
            .field(F::property("email", ValueType::String).unique())
            .field(F::property("display_name", ValueType::String))
            .field(F::version("version"))
    }
}

pub fn account(email: Option<&str>, display_name: &str) -> EntityRef {
    EntityRef::new(Account {
        email: email.map(str::to_string),
        display_name: display_name.to_string(),
        ..Account::default()
    })
}

// ============================================================================
// Tag (assigned id) / Ticket (external id)
// ============================================================================

#[derive(Debug, Default)]
pub struct Tag {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl DomainObject for Tag {
    fn entity_name(&self) -> &str { "Tag" }

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
        Ok(match field {
            "name" => self.name.clone().into(),
            "color" => self.color.clone().into(),
            other => return unknown(other),
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        match field {
            "name" => self.name = value.try_into()?,
            "color" => self.color = value.try_into()?,
            other => return unknown(other),
        }
        Ok(())
    }

    any_impls!();
}

impl Entity for Tag {
    fn declaration() -> EntityDeclaration {
        EntityDeclaration::node("Tag")
            .id_strategy(IdStrategy::Assigned)
            .field(F::id("name").of_type(ValueType::String))
            .field(F::property("color", ValueType::String).nullable())
    }
}

#[derive(Debug, Default)]
pub struct Ticket {
    pub id: Option<i64>,
    pub summary: String,
}

impl DomainObject for Ticket {
    fn entity_name(&self) -> &str { "Ticket" }

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
        Ok(match field {
            "id" => self.id.into(),
            "summary" => self.summary.clone().into(),
            other => return unknown(other),
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        match field {
            "id" => self.id = value.try_into()?,
            "summary" => self.summary = value.try_into()?,
            other => return unknown(other),
        }
        Ok(())
    }

    any_impls!();
}

impl Entity for Ticket {
    fn declaration() -> EntityDeclaration {
        EntityDeclaration::node("Ticket")
            .id_strategy(IdStrategy::External)
            .field(F::id("id"))
            .field(F::property("summary", ValueType::String))
    }
}

// ============================================================================
// Car (unrelated to everything)
// ============================================================================

#[derive(Debug, Default)]
pub struct Car {
    pub id: Option<i64>,
    pub model: String,
}

impl DomainObject for Car {
    fn entity_name(&self) -> &str { "Car" }

    fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
        Ok(match field {
            "id" => self.id.into(),
            "model" => self.model.clone().into(),
            other => return unknown(other),
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), AccessError> {
        match field {
            "id" => self.id = value.try_into()?,
            "model" => self.model = value.try_into()?,
            other => return unknown(other),
        }
        Ok(())
    }

    any_impls!();
}

impl Entity for Car {
    fn declaration() -> EntityDeclaration {
        EntityDeclaration::node("Car").field(F::id("id")).field(F::property("model", ValueType::String))
    }
}

// ============================================================================
// Mapper setup
// ============================================================================

pub fn mapper() -> Mapper<MemoryStore> {
    mapper_with(MappingConfig::default())
}

pub fn mapper_with(config: MappingConfig) -> Mapper<MemoryStore> {
    let mapper = Mapper::new(MemoryStore::new(), config);
    mapper.register::<Person>().unwrap();
    mapper.register::<Movie>().unwrap();
    mapper.register::<Role>().unwrap();
    mapper.register::<Link>().unwrap();
    mapper.register_declaration(animal_declaration()).unwrap();
    mapper.register::<Dog>().unwrap();
    mapper.register::<Cat>().unwrap();
    mapper.register::<Account>().unwrap();
    mapper.register::<Tag>().unwrap();
    mapper.register::<Ticket>().unwrap();
    mapper.register::<Car>().unwrap();
    mapper.initialize().unwrap();
    mapper
}

pub fn property_typed_mapper() -> Mapper<MemoryStore> {
    mapper_with(MappingConfig::default().with_node_type_strategy(NodeTypeStrategy::Property))
}
