/// Value of one record field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue {
    #[default]
    Absent,
    Single(String),
    /// Repeated elements, in document order.
    Many(Vec<String>),
}

impl FieldValue {
    pub fn from_option(value: Option<String>) -> Self {
        value.map_or(FieldValue::Absent, FieldValue::Single)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Flattens the value to one cell; sequences are joined with `separator`.
    pub fn render(&self, separator: &str) -> String {
        match self {
            FieldValue::Absent => String::new(),
            FieldValue::Single(value) => value.clone(),
            FieldValue::Many(values) => values.join(separator),
        }
    }

    fn append(&mut self, value: Option<String>) {
        let Some(value) = value else {
            return;
        };
        match self {
            FieldValue::Absent => *self = FieldValue::Single(value),
            FieldValue::Single(first) => {
                *self = FieldValue::Many(vec![std::mem::take(first), value]);
            }
            FieldValue::Many(values) => values.push(value),
        }
    }
}

/// A schema-less metadata record. Field order is insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Adds an occurrence of `name`. A repeated field becomes a sequence;
    /// an absent occurrence never overwrites data already present.
    pub fn push(&mut self, name: &str, value: Option<String>) {
        match self.fields.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => slot.append(value),
            None => self
                .fields
                .push((name.to_string(), FieldValue::from_option(value))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}
