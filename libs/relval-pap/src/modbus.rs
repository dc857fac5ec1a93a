//! Modbus register splitter
//!
//! A Modbus source point holds a block of 16-bit registers (or of coils when
//! the point is declared with `content: tuple<boolean>`). Each result
//! relation picks a field out of the block:
//!
//! - `Index` / `Offset`: first register of the field
//! - `Size`: number of registers, 1 to 4 (default 1, or 2 for floats)
//! - `Float`: IEEE float from 2 (f32) or 4 (f64) registers
//! - `Signed`: sign-extend integers
//! - `Bit`: single bit of the field, as a boolean
//!
//! The register order of multi-register fields comes from the `MODBUS`
//! attributes of the point or its origin.

use std::fmt;

use relval_model::{Content, ElementContent, Metadata, Params, PointId, PointValue, Value};
use tracing::{debug, warn};

use crate::splitter::{as_items, bit_param, result_position, PlanCache, Splitted, Splitter};

/// Attribute usage of Modbus origins
pub const ATTRIBUTES_USAGE: &str = "MODBUS";
pub const LITTLE_ENDIAN_ATTRIBUTE: &str = "LITTLE_ENDIAN";
pub const MIDDLE_ENDIAN_ATTRIBUTE: &str = "MIDDLE_ENDIAN";

pub const FLOAT_PARAM: &str = "Float";
pub const SIGNED_PARAM: &str = "Signed";
pub const SIZE_PARAM: &str = "Size";

const WORD_BITS: u32 = 16;
const MAX_SIZE: u32 = 4;

/// Order of the 16-bit registers of a multi-register field
///
/// For the 32-bit value `0x12345678` held in registers `[r0, r1]`:
/// - `HighFirst`: `r0 = 0x1234`, `r1 = 0x5678`
/// - `LowFirst`: `r0 = 0x5678`, `r1 = 0x1234` (middle-endian)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WordOrder {
    #[default]
    HighFirst,
    LowFirst,
}

impl WordOrder {
    /// Word order from `MODBUS` attributes
    ///
    /// `MIDDLE_ENDIAN` selects low word first; `LITTLE_ENDIAN` inverts the
    /// interpretation.
    pub fn from_attributes(attributes: &Params) -> errors::Result<Self> {
        let little_endian = attributes.get_bool_or(LITTLE_ENDIAN_ATTRIBUTE, false)?;
        let middle_endian = attributes.get_bool_or(MIDDLE_ENDIAN_ATTRIBUTE, false)?;
        Ok(if middle_endian != little_endian {
            Self::LowFirst
        } else {
            Self::HighFirst
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighFirst => "high word first",
            Self::LowFirst => "low word first",
        }
    }

    pub fn is_middle_endian(&self) -> bool {
        matches!(self, Self::LowFirst)
    }
}

impl fmt::Display for WordOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the source value is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Single value, handed to every result
    Scalar,
    /// Coils, one boolean per element
    Bits,
    /// Registers
    Registers(WordOrder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub point: PointId,
    pub offset: usize,
    pub size: u32,
    pub bit: Option<u32>,
    pub signed: bool,
    pub float: bool,
}

impl Field {
    fn scalar(point: PointId) -> Self {
        Self {
            point,
            offset: 0,
            size: 0,
            bit: None,
            signed: false,
            float: false,
        }
    }

    /// Decode this field from the source items
    fn decode(&self, layout: Layout, items: &[Option<Value>]) -> Option<Value> {
        let word_order = match layout {
            Layout::Scalar => return items.first().cloned().flatten(),
            Layout::Bits => return items.get(self.offset).cloned().flatten(),
            Layout::Registers(word_order) => word_order,
        };

        let field_bits = self.size * WORD_BITS;
        let mut offset = self.offset;
        let mut bit = self.bit;
        if let Some(b) = bit.filter(|b| *b >= field_bits) {
            offset += (b / field_bits) as usize;
            bit = Some(b % WORD_BITS);
        }

        let size = self.size as usize;
        let registers = items.get(offset..offset.checked_add(size)?)?;
        let mut holder: u64 = 0;
        for i in 0..size {
            let register = match word_order {
                WordOrder::HighFirst => &registers[i],
                WordOrder::LowFirst => &registers[size - i - 1],
            };
            let word = register.as_ref().filter(|v| v.is_number())?.as_i64()?;
            holder = (holder << WORD_BITS) | (word as u64 & 0xFFFF);
        }

        Some(if let Some(bit) = bit {
            Value::Boolean(holder & (1u64 << bit) != 0)
        } else if self.float {
            if self.size == 2 {
                Value::Float(f32::from_bits(holder as u32))
            } else {
                Value::Double(f64::from_bits(holder))
            }
        } else if self.signed {
            let shift = (MAX_SIZE - self.size) * WORD_BITS;
            Value::Long(((holder << shift) as i64) >> shift)
        } else {
            Value::Long(holder as i64)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModbusPlan {
    pub layout: Layout,
    pub fields: Vec<Field>,
}

#[derive(Default)]
pub struct ModbusSplitter {
    plans: PlanCache<ModbusPlan>,
}

impl ModbusSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&self, source: PointId) -> Option<std::sync::Arc<ModbusPlan>> {
        self.plans.get(source)
    }

    fn layout(metadata: &Metadata, source: PointId) -> Layout {
        let point = metadata.point(source);
        match point.content {
            Some(Content::Tuple(Some(ElementContent::Boolean))) => return Layout::Bits,
            Some(Content::Tuple(_)) => {},
            _ => return Layout::Scalar,
        }

        let word_order = match metadata.attributes(source, ATTRIBUTES_USAGE) {
            Some(attributes) => WordOrder::from_attributes(attributes).unwrap_or_else(|e| {
                warn!("Point {}: {}", point, e);
                WordOrder::default()
            }),
            None => {
                debug!("No {} attributes for point {}", ATTRIBUTES_USAGE, point);
                WordOrder::default()
            },
        };
        debug!("Point {} splits registers {}", point, word_order);
        Layout::Registers(word_order)
    }

    fn field(layout: Layout, relation: &relval_model::PointRelation) -> errors::Result<Field> {
        let offset = result_position(relation)?;
        if layout == Layout::Bits {
            return Ok(Field {
                offset,
                ..Field::scalar(relation.result)
            });
        }

        let params = &relation.params;
        let bit = bit_param(relation)?;
        let float = params.get_bool_or(FLOAT_PARAM, false)?;
        let size = params.get_int_or(SIZE_PARAM, if float { 2 } else { 1 })?;
        if !(1..=i64::from(MAX_SIZE)).contains(&size) || (float && size != 2 && size != 4) {
            return Err(errors::RelvalError::invalid_parameter(
                SIZE_PARAM,
                format!("{} is not a valid size", size),
            ));
        }
        let signed = params.get_bool_or(SIGNED_PARAM, false)?;

        Ok(Field {
            point: relation.result,
            offset,
            size: size as u32,
            bit,
            signed: signed && bit.is_none() && !float,
            float,
        })
    }

    fn build(metadata: &Metadata, source: PointId) -> (Option<ModbusPlan>, bool) {
        let layout = Self::layout(metadata, source);
        let mut fields = Vec::new();
        let mut accepted = true;

        for relation in metadata.result_relations(source) {
            let result = metadata.point(relation.result);
            if result.inputs.len() > 1 {
                warn!("Point {} must have exactly 1 input", result);
                accepted = false;
                continue;
            }
            if layout == Layout::Scalar {
                fields.push(Field::scalar(relation.result));
                continue;
            }
            match Self::field(layout, relation) {
                Ok(field) => fields.push(field),
                Err(e) => {
                    warn!("Relation {} -> {} rejected: {}", metadata.point(source), result, e);
                    accepted = false;
                },
            }
        }

        debug!("Point {} splits into {} fields", metadata.point(source), fields.len());
        let plan = (!fields.is_empty()).then_some(ModbusPlan { layout, fields });
        (plan, accepted)
    }
}

impl Splitter for ModbusSplitter {
    fn protocol(&self) -> &'static str {
        "Modbus"
    }

    fn set_up(&self, metadata: &Metadata, source: PointId) -> bool {
        self.plans.get_or_build(source, || Self::build(metadata, source))
    }

    fn has_detail(&self, source: PointId, result: PointId) -> bool {
        self.plans
            .get(source)
            .is_some_and(|plan| plan.fields.iter().any(|f| f.point == result))
    }

    fn split(&self, value: &PointValue) -> Option<Splitted> {
        let plan = self.plans.get(value.point)?;
        let items = as_items(value);
        let mut splitted = Splitted::new();
        for field in &plan.fields {
            splitted.put(field.point, field.decode(plan.layout, &items));
        }
        Some(splitted)
    }
}
