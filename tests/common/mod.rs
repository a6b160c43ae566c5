//! Shared fixture for the end-to-end tests: a person/event/qualification
//! entity domain, its field resolver, and a tiny in-memory row store that
//! stands in for the storage backend by executing compiled queries.

use chrono::NaiveDate;
use sievetree::*;
use std::collections::HashMap;

// --- Filterable fields of the person domain ---

pub fn age() -> FilterableField {
    FilterableField::new("person.age", FieldKind::Int)
}

pub fn first_name() -> FilterableField {
    FilterableField::new("person.firstName", FieldKind::Text { large: false })
}

pub fn diet() -> FilterableField {
    FilterableField::new("person.diet", FieldKind::Text { large: false })
}

pub fn remarks() -> FilterableField {
    FilterableField::new("person.remarks", FieldKind::Text { large: true })
}

pub fn date_of_birth() -> FilterableField {
    FilterableField::new("person.dateOfBirth", FieldKind::Date)
}

pub fn activist() -> FilterableField {
    FilterableField::new("person.activist", FieldKind::Compound)
}

pub fn gender() -> EnumeratedField {
    EnumeratedField::new("person.gender", ["Female", "Male", "Other"])
}

pub fn event() -> FilterableField {
    FilterableField::new("event", FieldKind::Entity)
}

pub fn event_name() -> FilterableField {
    FilterableField::new("event.name", FieldKind::Text { large: false })
}

pub fn qualification() -> FilterableField {
    FilterableField::new("qualification", FieldKind::Entity)
}

pub fn qualification_description() -> FilterableField {
    FilterableField::new("qualification.description", FieldKind::Text { large: true })
}

/// The person domain resolver; qualification fields are reached through a join.
pub fn person_resolver() -> MapResolver {
    MapResolver::builder()
        .path(&age(), "person.age")
        .path(&first_name(), "person.firstName")
        .path(&diet(), "person.diet")
        .path(&remarks(), "person.participantProfile.remarks")
        .path(&date_of_birth(), "person.participantProfile.dateOfBirth")
        .path(&activist(), "person.activistProfile")
        .path(gender().field(), "person.gender")
        .path(&event(), "person.participatingEvents")
        .path(&event_name(), "event.name")
        .entity(&event_name(), "event")
        .path(&qualification(), "person.referentProfile.qualifications")
        .path(&qualification_description(), "qualification.description")
        .join(
            &qualification_description(),
            "person.referentProfile.qualifications",
            "qualification",
        )
        .build()
}

/// Same domain, but qualification descriptions resolve without a join, forcing
/// the independent-subquery strategy.
pub fn subquery_resolver() -> MapResolver {
    MapResolver::builder()
        .path(&qualification(), "person.referentProfile.qualifications")
        .path(&qualification_description(), "qualification.description")
        .entity(&qualification_description(), "qualification")
        .build()
}

// --- In-memory rows and query execution ---

#[derive(Debug, Clone, Default)]
pub struct Row {
    pub id: String,
    scalars: HashMap<String, FieldValue>,
    relations: HashMap<String, Vec<String>>,
}

impl Row {
    pub fn new(id: &str) -> Self {
        Row {
            id: id.to_string(),
            ..Row::default()
        }
    }

    pub fn set(mut self, path: &str, value: impl Into<FieldValue>) -> Self {
        self.scalars.insert(path.to_string(), value.into());
        self
    }

    pub fn relate(mut self, path: &str, ids: &[&str]) -> Self {
        self.relations
            .insert(path.to_string(), ids.iter().map(|i| i.to_string()).collect());
        self
    }
}

#[derive(Debug, Default)]
pub struct Store {
    tables: HashMap<String, Vec<Row>>,
}

fn entity_of(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

impl Store {
    pub fn insert(&mut self, entity: &str, row: Row) {
        self.tables.entry(entity.to_string()).or_default().push(row);
    }

    /// Executes a compiled query, returning matching base-row ids in table
    /// order (distinct).
    pub fn execute(&self, query: &EntityQuery) -> Vec<String> {
        let mut matched: Vec<String> = Vec::new();
        let rows = match self.tables.get(query.root.name()) {
            Some(rows) => rows,
            None => return matched,
        };
        for base in rows {
            let mut contexts: Vec<HashMap<&str, &Row>> = vec![{
                let mut ctx = HashMap::new();
                ctx.insert(query.root.name(), base);
                ctx
            }];
            for join in &query.joins {
                let mut expanded = Vec::new();
                for ctx in &contexts {
                    let source_entity = entity_of(join.source.as_str());
                    let Some(source_row) = ctx.get(source_entity) else {
                        continue;
                    };
                    let Some(ids) = source_row.relations.get(join.source.as_str()) else {
                        continue;
                    };
                    for target in self.tables.get(join.target.name()).into_iter().flatten() {
                        if ids.contains(&target.id) {
                            let mut ctx = ctx.clone();
                            ctx.insert(join.target.name(), target);
                            expanded.push(ctx);
                        }
                    }
                }
                contexts = expanded;
            }
            let hit = contexts.iter().any(|ctx| self.eval(&query.predicate, ctx));
            if hit && !matched.contains(&base.id) {
                matched.push(base.id.clone());
            }
        }
        matched
    }

    fn scalar(&self, ctx: &HashMap<&str, &Row>, path: &StoragePath) -> Option<FieldValue> {
        let entity = entity_of(path.as_str());
        let row = ctx.get(entity)?;
        if path.as_str() == entity {
            return Some(FieldValue::Text(row.id.clone()));
        }
        row.scalars.get(path.as_str()).cloned()
    }

    fn eval(&self, predicate: &Predicate, ctx: &HashMap<&str, &Row>) -> bool {
        match predicate {
            Predicate::Compare { path, op, value } => {
                let Some(actual) = self.scalar(ctx, path) else {
                    return false;
                };
                match actual.compare(value) {
                    Some(ordering) => match op {
                        CompareOp::Lt => ordering.is_lt(),
                        CompareOp::Eq => ordering.is_eq(),
                        CompareOp::Gt => ordering.is_gt(),
                        _ => false,
                    },
                    None => false,
                }
            }
            Predicate::EqIgnoreCase { path, value } => self
                .scalar(ctx, path)
                .and_then(|actual| actual.as_text().map(|s| s.eq_ignore_ascii_case(value)))
                .unwrap_or(false),
            Predicate::ContainsIgnoreCase { path, value } => self
                .scalar(ctx, path)
                .and_then(|actual| {
                    actual
                        .as_text()
                        .map(|s| s.to_lowercase().contains(&value.to_lowercase()))
                })
                .unwrap_or(false),
            Predicate::IsPresent { path } => self.scalar(ctx, path).is_some(),
            Predicate::IsAbsent { path } => self.scalar(ctx, path).is_none(),
            Predicate::Not(inner) => !self.eval(inner, ctx),
            Predicate::And(a, b) => self.eval(a, ctx) && self.eval(b, ctx),
            Predicate::Or(a, b) => self.eval(a, ctx) || self.eval(b, ctx),
            Predicate::InSubquery { path, query } => {
                let sub_ids = self.execute(query);
                let entity = entity_of(path.as_str());
                ctx.get(entity)
                    .and_then(|row| row.relations.get(path.as_str()))
                    .map(|ids| ids.iter().any(|id| sub_ids.contains(id)))
                    .unwrap_or(false)
            }
        }
    }
}

/// Three persons, two events, two qualifications.
pub fn store() -> Store {
    let mut store = Store::default();
    store.insert(
        "person",
        Row::new("alice")
            .set("person.age", 30i64)
            .set("person.firstName", "Alice")
            .set("person.diet", "vegan")
            .set("person.participantProfile.remarks", "Is fully VEGAN now")
            .set(
                "person.participantProfile.dateOfBirth",
                NaiveDate::from_ymd_opt(1994, 3, 2).unwrap(),
            )
            .set("person.activistProfile", true)
            .set("person.gender", "Female")
            .relate("person.participatingEvents", &["summer", "winter"])
            .relate("person.referentProfile.qualifications", &["q-first-aid"]),
    );
    store.insert(
        "person",
        Row::new("bob")
            .set("person.age", 40i64)
            .set("person.firstName", "Bob")
            .set("person.diet", "omnivore")
            .set("person.participantProfile.remarks", "carnivore")
            .set(
                "person.participantProfile.dateOfBirth",
                NaiveDate::from_ymd_opt(1984, 7, 20).unwrap(),
            )
            .set("person.gender", "Male")
            .relate("person.participatingEvents", &["winter"])
            .relate("person.referentProfile.qualifications", &["q-climbing"]),
    );
    store.insert(
        "person",
        Row::new("carol")
            .set("person.age", 20i64)
            .set("person.firstName", "Carol")
            .set("person.diet", "vegetarian")
            .set(
                "person.participantProfile.remarks",
                "prefers vegetarian meals",
            )
            .set(
                "person.participantProfile.dateOfBirth",
                NaiveDate::from_ymd_opt(2004, 1, 15).unwrap(),
            )
            .set("person.activistProfile", true)
            .set("person.gender", "Female"),
    );
    store.insert("event", Row::new("summer").set("event.name", "Summer camp"));
    store.insert("event", Row::new("winter").set("event.name", "Winter camp"));
    store.insert(
        "qualification",
        Row::new("q-first-aid").set("qualification.description", "First Aid certified"),
    );
    store.insert(
        "qualification",
        Row::new("q-climbing").set("qualification.description", "Climbing instructor"),
    );
    store
}
