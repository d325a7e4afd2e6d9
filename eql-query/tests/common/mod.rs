#![allow(dead_code)]

use eql_query::{AttributeDef, Entity, EntityType, Value};
use std::sync::Arc;

pub static CONTAINER: EntityType =
    EntityType::new("Container", &[], &[AttributeDef::scalar("name")]);
pub static HANDLE: EntityType = EntityType::new("Handle", &[], &[AttributeDef::scalar("name")]);
pub static CONNECTION: EntityType = EntityType::new(
    "Connection",
    &[],
    &[AttributeDef::scalar("parent"), AttributeDef::scalar("child")],
);
pub static FIXED_CONNECTION: EntityType =
    EntityType::new("FixedConnection", &[&CONNECTION], &[]);
pub static REVOLUTE_CONNECTION: EntityType = EntityType::new(
    "RevoluteConnection",
    &[&CONNECTION],
    &[AttributeDef::scalar("angle")],
);
pub static DRAWER: EntityType = EntityType::new(
    "Drawer",
    &[],
    &[AttributeDef::scalar("handle"), AttributeDef::scalar("container")],
);
pub static CABINET: EntityType = EntityType::new(
    "Cabinet",
    &[],
    &[
        AttributeDef::scalar("container"),
        AttributeDef::collection("drawers"),
    ],
);

#[derive(Debug)]
pub struct Container {
    pub name: String,
}

impl Entity for Container {
    fn entity_type(&self) -> &'static EntityType {
        &CONTAINER
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(self.name.as_str().into()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Handle {
    pub name: String,
}

impl Entity for Handle {
    fn entity_type(&self) -> &'static EntityType {
        &HANDLE
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(self.name.as_str().into()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct FixedConnection {
    pub parent: Arc<Container>,
    pub child: Arc<Handle>,
}

impl Entity for FixedConnection {
    fn entity_type(&self) -> &'static EntityType {
        &FIXED_CONNECTION
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "parent" => Some(Value::entity(self.parent.clone())),
            "child" => Some(Value::entity(self.child.clone())),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct RevoluteConnection {
    pub parent: Arc<Container>,
    pub child: Arc<Handle>,
    pub angle: f64,
}

impl Entity for RevoluteConnection {
    fn entity_type(&self) -> &'static EntityType {
        &REVOLUTE_CONNECTION
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "parent" => Some(Value::entity(self.parent.clone())),
            "child" => Some(Value::entity(self.child.clone())),
            "angle" => Some(self.angle.into()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Drawer {
    pub handle: Option<Arc<Handle>>,
    pub container: Arc<Container>,
}

impl Entity for Drawer {
    fn entity_type(&self) -> &'static EntityType {
        &DRAWER
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "handle" => Some(self.handle.clone().into()),
            "container" => Some(Value::entity(self.container.clone())),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Cabinet {
    pub container: Arc<Container>,
    pub drawers: Vec<Arc<Drawer>>,
}

impl Entity for Cabinet {
    fn entity_type(&self) -> &'static EntityType {
        &CABINET
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "container" => Some(Value::entity(self.container.clone())),
            "drawers" => Some(Value::entities(self.drawers.iter().cloned())),
            _ => None,
        }
    }
}

pub fn container(name: &str) -> Arc<Container> {
    Arc::new(Container { name: name.into() })
}

pub fn handle(name: &str) -> Arc<Handle> {
    Arc::new(Handle { name: name.into() })
}

pub fn fixed(parent: &Arc<Container>, child: &Arc<Handle>) -> Arc<FixedConnection> {
    Arc::new(FixedConnection {
        parent: parent.clone(),
        child: child.clone(),
    })
}

pub fn drawer(handle: &Arc<Handle>, container: &Arc<Container>) -> Arc<Drawer> {
    Arc::new(Drawer {
        handle: Some(handle.clone()),
        container: container.clone(),
    })
}

/// The kitchen used throughout the tests:
///
/// - two fixed connections, `C1 -> H1` and `CX -> H1`
/// - a cabinet in `C1` with drawers `(H1, C1)` and `(X, CX)`
pub struct World {
    pub c1: Arc<Container>,
    pub cx: Arc<Container>,
    pub h1: Arc<Handle>,
    pub hx: Arc<Handle>,
    pub connections: Vec<Arc<FixedConnection>>,
    pub drawers: Vec<Arc<Drawer>>,
    pub cabinet: Arc<Cabinet>,
}

pub fn world() -> World {
    let c1 = container("C1");
    let cx = container("CX");
    let h1 = handle("H1");
    let hx = handle("X");
    let connections = vec![fixed(&c1, &h1), fixed(&cx, &h1)];
    let drawers = vec![drawer(&h1, &c1), drawer(&hx, &cx)];
    let cabinet = Arc::new(Cabinet {
        container: c1.clone(),
        drawers: drawers.clone(),
    });
    World {
        c1,
        cx,
        h1,
        hx,
        connections,
        drawers,
        cabinet,
    }
}

/// Identity check between a query result and a fixture object.
pub fn is<E: Entity + 'static>(value: &Value, expected: &Arc<E>) -> bool {
    *value == Value::entity(expected.clone())
}
