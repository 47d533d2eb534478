//! Record types stored in the equation database

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use latex_engine::{CompiledFragment, FragmentError, Resolution, TemplateId};
use serde::{Deserialize, Serialize};

/// Source used for new math objects when none is given
pub const DEFAULT_LATEX: &str = "a^2 + b^2 = c^2";

/// Type name given to new math objects
pub const DEFAULT_TYPE: &str = "Unassigned";

/// The three kinds of math object, one table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathKind {
    Equation,
    Variable,
    Unit,
}

impl MathKind {
    pub const ALL: [MathKind; 3] = [MathKind::Equation, MathKind::Variable, MathKind::Unit];

    pub fn table(&self) -> &'static str {
        match self {
            MathKind::Equation => "equation",
            MathKind::Variable => "variable",
            MathKind::Unit => "unit",
        }
    }

    pub fn type_table(&self) -> &'static str {
        match self {
            MathKind::Equation => "equation_type",
            MathKind::Variable => "variable_type",
            MathKind::Unit => "unit_type",
        }
    }

    /// Whether rows of this kind reference a unit
    pub fn has_unit(&self) -> bool {
        !matches!(self, MathKind::Unit)
    }

    /// Type names present in a fresh database
    pub fn seed_types(&self) -> &'static [&'static str] {
        match self {
            MathKind::Equation => &[DEFAULT_TYPE, "Undesignated"],
            MathKind::Variable => &[DEFAULT_TYPE, "Constant"],
            MathKind::Unit => &[DEFAULT_TYPE],
        }
    }
}

impl fmt::Display for MathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

impl FromStr for MathKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equation" | "equations" => Ok(MathKind::Equation),
            "variable" | "variables" => Ok(MathKind::Variable),
            "unit" | "units" => Ok(MathKind::Unit),
            other => Err(format!("Unknown math object kind: {}", other)),
        }
    }
}

/// An ordered parent/child relation backed by a join table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    /// Equations inside an equation group
    EquationGroup,
    /// Variables used by an equation
    VariableEquation,
}

impl Link {
    pub fn table(&self) -> &'static str {
        match self {
            Link::EquationGroup => "equation_eqn_group",
            Link::VariableEquation => "variable_equation",
        }
    }

    pub fn child_kind(&self) -> MathKind {
        match self {
            Link::EquationGroup => MathKind::Equation,
            Link::VariableEquation => MathKind::Variable,
        }
    }

    pub fn parent_table(&self) -> &'static str {
        match self {
            Link::EquationGroup => "eqn_group",
            Link::VariableEquation => "equation",
        }
    }

    pub fn child_column(&self) -> &'static str {
        match self {
            Link::EquationGroup => "equation_id",
            Link::VariableEquation => "variable_id",
        }
    }

    pub fn parent_column(&self) -> &'static str {
        match self {
            Link::EquationGroup => "eqn_group_id",
            Link::VariableEquation => "equation_id",
        }
    }

    /// Whether rows carry a `code_file_path`
    pub fn has_code_file_path(&self) -> bool {
        matches!(self, Link::EquationGroup)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

impl FromStr for Link {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "equation_eqn_group" | "equation_group" | "group" => Ok(Link::EquationGroup),
            "variable_equation" | "equation" => Ok(Link::VariableEquation),
            other => Err(format!("Unknown link: {}", other)),
        }
    }
}

/// Who created and last modified a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGroup {
    /// `None` picks the next free `eqn_group N`
    pub name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub notes: Option<String>,
}

impl GroupUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.notes.is_none()
    }
}

/// An equation, variable or unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MathObject {
    pub id: i64,
    pub kind: MathKind,
    pub name: String,
    pub latex: String,
    pub template_id: Option<TemplateId>,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
    pub compiled_at: Option<DateTime<Utc>>,
    pub image_is_dirty: bool,
    pub notes: Option<String>,
    pub dimensions: i64,
    pub unit_id: Option<i64>,
    pub type_name: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl MathObject {
    /// The stored LaTeX columns as a fragment
    ///
    /// Dirty rows come back `Dirty` without an image.
    pub fn fragment(&self) -> Result<CompiledFragment, FragmentError> {
        CompiledFragment::stored(
            self.latex.clone(),
            self.template_id,
            self.image.clone(),
            self.compiled_at,
            self.image_is_dirty,
        )
    }
}

/// Columns of a new math object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMathObject {
    /// `None` picks the next free `<table> N`
    pub name: Option<String>,
    /// A dirty fragment is stored without an image and flagged for refresh
    pub fragment: CompiledFragment,
    pub notes: Option<String>,
    pub dimensions: i64,
    pub unit_id: Option<i64>,
    pub type_name: Option<String>,
}

impl Default for NewMathObject {
    fn default() -> Self {
        Self {
            name: None,
            fragment: CompiledFragment::pending(DEFAULT_LATEX, None),
            notes: None,
            dimensions: 1,
            unit_id: None,
            type_name: None,
        }
    }
}

impl NewMathObject {
    /// A new object holding an already compiled fragment
    pub fn compiled(fragment: CompiledFragment) -> Self {
        Self {
            fragment,
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Column changes for a math object; `None` leaves a column alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectUpdate {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub dimensions: Option<i64>,
    pub unit_id: Option<i64>,
    pub type_name: Option<String>,
    /// Replaces `latex`, `image`, `template_id`, `compiled_at` and `image_is_dirty` together
    pub fragment: Option<CompiledFragment>,
}

impl ObjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.notes.is_none()
            && self.dimensions.is_none()
            && self.unit_id.is_none()
            && self.type_name.is_none()
            && self.fragment.is_none()
    }
}

/// A row of a join table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub parent_id: i64,
    pub child_id: i64,
    pub insertion_order: i64,
    pub insertion_date: DateTime<Utc>,
    pub inserted_by: String,
    pub code_file_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationInput {
    /// `None` appends after the current last child
    pub insertion_order: Option<i64>,
    /// `None` records the database user
    pub inserted_by: Option<String>,
    /// Only valid for [`Link::EquationGroup`]
    pub code_file_path: Option<String>,
}

/// A child object together with its association row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Child {
    pub object: MathObject,
    pub association: Association,
}

/// A math object after a fragment edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditedObject {
    pub object: MathObject,
    /// How the template was chosen; `None` when the edit compiled nothing
    pub resolution: Option<Resolution>,
}

impl EditedObject {
    /// The requested template version was missing and the latest was used
    pub fn fell_back(&self) -> bool {
        self.resolution.is_some_and(|r| r.is_fallback())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("Unknown direction: {}", other)),
        }
    }
}
