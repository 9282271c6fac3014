#[derive(Debug, Clone)]
pub enum Values<T> {
    Dense(Vec<T>),
    Masked(Vec<Option<T>>),
}

impl<T> Values<T> {
    pub fn from_options(values: Vec<Option<T>>) -> Self {
        if values.iter().all(Option::is_some) {
            Values::Dense(values.into_iter().flatten().collect())
        } else {
            Values::Masked(values)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Values::Dense(values) => values.len(),
            Values::Masked(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        match self {
            Values::Dense(values) => values.get(index),
            Values::Masked(values) => values.get(index).and_then(Option::as_ref),
        }
    }

    pub fn is_missing(&self, index: usize) -> bool {
        match self {
            Values::Dense(_) => false,
            Values::Masked(values) => matches!(values.get(index), Some(None)),
        }
    }

    pub fn has_missing(&self) -> bool {
        match self {
            Values::Dense(_) => false,
            Values::Masked(values) => values.iter().any(Option::is_none),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = Option<&T>> + '_> {
        match self {
            Values::Dense(values) => Box::new(values.iter().map(Some)),
            Values::Masked(values) => Box::new(values.iter().map(Option::as_ref)),
        }
    }

    pub fn into_options(self) -> Vec<Option<T>> {
        match self {
            Values::Dense(values) => values.into_iter().map(Some).collect(),
            Values::Masked(values) => values,
        }
    }

    pub fn as_dense(&self) -> Option<&[T]> {
        match self {
            Values::Dense(values) => Some(values),
            Values::Masked(_) => None,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Values<U> {
        match self {
            Values::Dense(values) => Values::Dense(values.into_iter().map(f).collect()),
            Values::Masked(values) => {
                Values::Masked(values.into_iter().map(|x| x.map(&mut f)).collect())
            }
        }
    }
}

impl<T: PartialEq> PartialEq for Values<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<T> From<Vec<T>> for Values<T> {
    fn from(values: Vec<T>) -> Self {
        Values::Dense(values)
    }
}

pub trait Placeholder {
    fn is_placeholder(&self, placeholder: &Self) -> bool;
}

impl Placeholder for f64 {
    fn is_placeholder(&self, placeholder: &Self) -> bool {
        if placeholder.is_nan() {
            self.is_nan()
        } else {
            self == placeholder
        }
    }
}

impl Placeholder for i64 {
    fn is_placeholder(&self, placeholder: &Self) -> bool {
        self == placeholder
    }
}

impl Placeholder for i32 {
    fn is_placeholder(&self, placeholder: &Self) -> bool {
        self == placeholder
    }
}

impl Placeholder for String {
    fn is_placeholder(&self, placeholder: &Self) -> bool {
        self == placeholder
    }
}

pub fn substitute_placeholder<T: Placeholder>(values: Values<T>, placeholder: &T) -> Values<T> {
    let matched = values
        .iter()
        .any(|x| x.is_some_and(|x| x.is_placeholder(placeholder)));
    if !matched {
        return values;
    }
    let substituted = values
        .into_options()
        .into_iter()
        .map(|x| x.filter(|x| !x.is_placeholder(placeholder)))
        .collect();
    Values::Masked(substituted)
}
