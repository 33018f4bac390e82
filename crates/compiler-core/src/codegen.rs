use serde::{Deserialize, Serialize};
use stache_compiler_shared::COMPILER_REVISION;
use tracing::debug;

use crate::{
    compiler::{Environment, Opcode, Operand, Param},
    errors::SetupError,
    options::{CodegenOptions, DEFAULT_NAMESPACE},
};

/// Version of the toolchain that produced a template, stamped next to the
/// revision for diagnostics.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A flattened program. Program references in its opcodes are indices into
/// [`TemplateSpec::programs`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSpec {
    pub opcodes: Vec<Opcode>,
    #[serde(default)]
    pub block_params: usize,
}

/// The serializable form of a compiled template. Handed to a runtime to get
/// a renderable template back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    /// `(revision, version)` of the compiler that produced the spec.
    pub compiler: (u32, String),
    /// Namespace of the runtime this template must run against.
    pub namespace: String,
    pub main: usize,
    pub programs: Vec<ProgramSpec>,
    pub use_data: bool,
    pub use_depths: bool,
    pub use_block_params: bool,
    pub string_params: bool,
}

impl TemplateSpec {
    /// Serialized form suitable for writing to disk and loading with
    /// [`TemplateSpec::from_source`].
    pub fn to_source(&self) -> String {
        // a spec only holds strings, numbers, maps and sequences
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_source(source: &str) -> Result<Self, SetupError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn main_program(&self) -> Option<&ProgramSpec> {
        self.programs.get(self.main)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodegenResult {
    pub spec: TemplateSpec,
}

impl CodegenResult {
    pub fn source(&self) -> String {
        self.spec.to_source()
    }
}

struct CodegenContext {
    programs: Vec<ProgramSpec>,
}

impl CodegenContext {
    /// Emits `env` after its children and returns its program index.
    /// Structurally identical programs share one slot.
    fn push(&mut self, env: Environment) -> usize {
        let ids: Vec<usize> = env
            .children
            .into_iter()
            .map(|child| self.push(child))
            .collect();
        let mut opcodes = env.opcodes;
        for opcode in opcodes.iter_mut() {
            if let Opcode::Append { value, .. } = opcode {
                remap_operand(value, &ids);
            }
        }
        let program = ProgramSpec {
            opcodes,
            block_params: env.block_params,
        };
        if let Some(index) = self.programs.iter().position(|p| p == &program) {
            return index;
        }
        self.programs.push(program);
        self.programs.len() - 1
    }
}

fn remap_index(index: &mut Option<usize>, ids: &[usize]) {
    if let Some(i) = index {
        *i = ids[*i];
    }
}

fn remap_param(param: &mut Param, ids: &[usize]) {
    match param {
        Param::Value { value } => remap_operand(value, ids),
        Param::Raw {
            value: Some(value), ..
        } => remap_operand(value, ids),
        Param::Raw { value: None, .. } => {}
    }
}

fn remap_operand(operand: &mut Operand, ids: &[usize]) {
    match operand {
        Operand::Helper(call) => {
            remap_index(&mut call.program, ids);
            remap_index(&mut call.inverse, ids);
            for param in call.params.iter_mut() {
                remap_param(param, ids);
            }
            for param in call.hash.values_mut() {
                remap_param(param, ids);
            }
        }
        Operand::Ambiguous(call) => {
            remap_index(&mut call.program, ids);
            remap_index(&mut call.inverse, ids);
        }
        Operand::BlockValue(call) => {
            remap_index(&mut call.program, ids);
            remap_index(&mut call.inverse, ids);
        }
        Operand::Context { .. }
        | Operand::Data { .. }
        | Operand::BlockParam { .. }
        | Operand::Literal { .. } => {}
    }
}

pub fn generate(env: Environment, options: &CodegenOptions) -> CodegenResult {
    let namespace = options
        .namespace
        .clone()
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let use_data = env.use_data;
    let use_depths = env.use_depths;
    let string_params = env.string_params;

    let mut context = CodegenContext { programs: vec![] };
    let main = context.push(env);
    let use_block_params = context.programs.iter().any(|p| p.block_params > 0);
    debug!(
        namespace = %namespace,
        programs = context.programs.len(),
        "generated template spec"
    );

    CodegenResult {
        spec: TemplateSpec {
            compiler: (COMPILER_REVISION, COMPILER_VERSION.to_string()),
            namespace,
            main,
            programs: context.programs,
            use_data,
            use_depths,
            use_block_params,
            string_params,
        },
    }
}
