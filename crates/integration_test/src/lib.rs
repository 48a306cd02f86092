//! Common fixture types for bytestream integration tests.
//!
//! This crate provides shared types used across integration tests.

#![allow(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    rc::Rc,
};

use bytestream::{Decode, Encode};

// ============================================================================
// Records
// ============================================================================

/// A flat record with text and integer fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct User {
    pub name: String,
    pub age: i64,
    pub email: String,
}

impl User {
    pub fn new(name: &str, age: i64, email: &str) -> Self {
        Self { name: name.to_string(), age, email: email.to_string() }
    }

    pub fn alice() -> Self { Self::new("Alice", 30, "alice@example.com") }

    pub fn bob() -> Self { Self::new("Bob", 41, "bob@example.com") }
}

/// The same shape as the first two fields of [`User`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Person {
    pub name: String,
    pub age: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Role {
    Admin,
    Member { since: u32 },
    Guest(String),
}

/// A record nesting other records, collections and options.
#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct Team {
    pub name: String,
    pub lead: Option<User>,
    pub members: Vec<User>,
    pub roles: HashMap<String, Role>,
    pub tags: BTreeSet<String>,
    pub logo: Vec<u8>,
    pub location: (f64, f64),
}

impl Team {
    pub fn sample() -> Self {
        let roles = HashMap::from([
            ("Alice".to_string(), Role::Admin),
            ("Bob".to_string(), Role::Member { since: 2019 }),
            ("Carol".to_string(), Role::Guest("visiting".to_string())),
        ]);

        Self {
            name: "core".to_string(),
            lead: Some(User::alice()),
            members: vec![User::alice(), User::bob()],
            roles,
            tags: ["infra", "storage"].map(str::to_string).into(),
            logo: vec![0x89, b'P', b'N', b'G'],
            location: (52.52, 13.405),
        }
    }
}

/// A record with a field that never reaches the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Session {
    pub user: User,
    #[bytestream(skip)]
    pub cache: HashMap<String, String>,
}

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum Shape {
    Circle { radius: f64 },
    Rectangle(f64, f64),
    Point,
}

/// A recursive list, one enum variant per level.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum List {
    Nil,
    Cons(i32, Box<List>),
}

impl List {
    pub fn from_slice(values: &[i32]) -> Self {
        values
            .iter()
            .rev()
            .fold(Self::Nil, |tail, &head| Self::Cons(head, Box::new(tail)))
    }

    pub fn to_vec(&self) -> Vec<i32> {
        let mut values = Vec::new();
        let mut current = self;
        while let Self::Cons(head, tail) = current {
            values.push(*head);
            current = tail;
        }
        values
    }
}

/// A generic wrapper exercising bounds on derived impls.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Tagged<T> {
    pub label: String,
    pub value: T,
}

// ============================================================================
// Shared ownership
// ============================================================================

/// A node that may point at another node, possibly itself.
#[derive(Encode, Decode)]
pub struct Link {
    pub value: u32,
    pub next: Option<Rc<RefCell<Link>>>,
}

impl Link {
    pub fn new(value: u32) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { value, next: None }))
    }

    /// Builds a chain of `len` nodes, returning its head.
    pub fn chain(len: u32) -> Rc<RefCell<Self>> {
        let head = Self::new(0);
        let mut tail = Rc::clone(&head);
        for value in 1..len {
            let next = Self::new(value);
            tail.borrow_mut().next = Some(Rc::clone(&next));
            tail = next;
        }
        head
    }

    /// Builds two nodes pointing at each other.
    pub fn cycle() -> Rc<RefCell<Self>> {
        let first = Self::new(1);
        let second = Self::new(2);
        second.borrow_mut().next = Some(Rc::clone(&first));
        first.borrow_mut().next = Some(second);
        first
    }

    /// Breaks the cycle so the nodes can be dropped.
    pub fn unlink(node: &Rc<RefCell<Self>>) { node.borrow_mut().next = None; }

    pub fn values(node: &Rc<RefCell<Self>>) -> Vec<u32> {
        let mut values = vec![node.borrow().value];
        let mut next = node.borrow().next.clone();
        while let Some(current) = next {
            values.push(current.borrow().value);
            next = current.borrow().next.clone();
        }
        values
    }
}
