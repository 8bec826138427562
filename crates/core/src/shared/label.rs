use std::fmt;

/// One outcome category of the classifier, identified by its output index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label {
    pub index: usize,
    pub name: String,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Closed, ordered set of labels: position `i` names model output `i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Label> {
        self.names.get(index).map(|name| Label {
            index,
            name: name.clone(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Label> + '_ {
        self.names.iter().enumerate().map(|(index, name)| Label {
            index,
            name: name.clone(),
        })
    }
}
