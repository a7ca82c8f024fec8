use rustc_hash::FxHashMap;

use bitcode_expr::{KValue, Width};

use crate::inst::{BlockId, Instruction, Operand, SourceLocation};

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("block {0:?} was created but never placed")]
    UnplacedBlock(BlockId),

    #[error("block {0:?} was placed twice")]
    BlockPlacedTwice(BlockId),

    #[error("function {0} already defined")]
    DuplicateFunction(String),

    #[error("function body is empty")]
    EmptyBody,
}

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

/// A prepared function: a flat instruction array plus the maps the
/// interpreter needs to navigate it.
#[derive(Debug)]
pub struct Function {
    name: String,
    params: Vec<Width>,
    instructions: Vec<Instruction>,
    locations: Vec<Option<SourceLocation>>,
    block_entries: Vec<usize>,
    is_declaration: bool,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Width] {
        &self.params
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn is_declaration(&self) -> bool {
        self.is_declaration
    }

    pub fn num_instructions(&self) -> usize {
        self.instructions.len()
    }

    pub fn instruction(&self, index: usize) -> &Instruction {
        &self.instructions[index]
    }

    pub fn location(&self, index: usize) -> Option<&SourceLocation> {
        self.locations.get(index).and_then(|l| l.as_ref())
    }

    /// Register slots: one per parameter followed by one per instruction.
    pub fn num_registers(&self) -> usize {
        self.params.len() + self.instructions.len()
    }

    /// The register the result of instruction `index` binds into.
    pub fn result_register(&self, index: usize) -> usize {
        self.params.len() + index
    }

    /// Instruction index where `block` begins.
    pub fn block_entry(&self, block: BlockId) -> usize {
        self.block_entries[block.0 as usize]
    }

    /// The block containing instruction `index`: the placed block with the
    /// greatest entry at or before it.
    pub fn block_containing(&self, index: usize) -> BlockId {
        let mut best = BlockId(0);
        let mut best_entry = 0;
        for (block, &entry) in self.block_entries.iter().enumerate() {
            if entry <= index && entry >= best_entry {
                best = BlockId(block as u32);
                best_entry = entry;
            }
        }
        best
    }
}

/// A linked set of prepared functions plus the evaluated constant table.
#[derive(Debug)]
pub struct Module {
    functions: Vec<Function>,
    constants: Vec<KValue>,
    by_name: FxHashMap<String, FunctionId>,
}

impl Module {
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.by_name.get(name).copied()
    }

    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn constant(&self, index: usize) -> &KValue {
        &self.constants[index]
    }
}

/// Assembles a [`Module`]. Constants are deduplicated into one table shared
/// by all functions, mirroring how the front end binds module constants once.
#[derive(Default)]
pub struct ModuleBuilder {
    functions: Vec<Function>,
    constants: Vec<KValue>,
    constant_index: FxHashMap<KValue, u32>,
    by_name: FxHashMap<String, FunctionId>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a constant and return its operand descriptor.
    pub fn constant(&mut self, value: KValue) -> Operand {
        if let Some(&index) = self.constant_index.get(&value) {
            return Operand::constant(index);
        }
        let index = self.constants.len() as u32;
        self.constants.push(value.clone());
        self.constant_index.insert(value, index);
        Operand::constant(index)
    }

    pub fn constant_int(&mut self, value: u128, width: Width) -> Operand {
        self.constant(KValue::from_constant(value, width))
    }

    pub fn constant_pointer(&mut self, segment: u64, offset: u64) -> Operand {
        self.constant(KValue::pointer(segment, offset))
    }

    /// Declare a body-less function; calls to it dispatch to the special
    /// handlers or the external dispatcher.
    pub fn declare_function(&mut self, name: &str, params: &[Width]) -> Result<FunctionId> {
        self.install(Function {
            name: name.to_string(),
            params: params.to_vec(),
            instructions: Vec::new(),
            locations: Vec::new(),
            block_entries: Vec::new(),
            is_declaration: true,
        })
    }

    pub fn add_function(&mut self, builder: FunctionBuilder) -> Result<FunctionId> {
        self.install(builder.build()?)
    }

    fn install(&mut self, function: Function) -> Result<FunctionId> {
        if self.by_name.contains_key(function.name()) {
            return Err(BuildError::DuplicateFunction(function.name().to_string()));
        }
        let id = FunctionId(self.functions.len() as u32);
        self.by_name.insert(function.name().to_string(), id);
        self.functions.push(function);
        Ok(id)
    }

    pub fn build(self) -> Module {
        Module {
            functions: self.functions,
            constants: self.constants,
            by_name: self.by_name,
        }
    }
}

/// Assembles one function. Blocks are created up front and placed when the
/// builder reaches them, producing the block entry map.
pub struct FunctionBuilder {
    name: String,
    params: Vec<Width>,
    instructions: Vec<Instruction>,
    locations: Vec<Option<SourceLocation>>,
    block_entries: Vec<Option<usize>>,
    pending_location: Option<SourceLocation>,
}

impl FunctionBuilder {
    pub fn new(name: &str, params: &[Width]) -> Self {
        FunctionBuilder {
            name: name.to_string(),
            params: params.to_vec(),
            instructions: Vec::new(),
            locations: Vec::new(),
            block_entries: Vec::new(),
            pending_location: None,
        }
    }

    /// Operand naming parameter `index`.
    pub fn param(&self, index: usize) -> Operand {
        debug_assert!(index < self.params.len());
        Operand::register(index as u32)
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.block_entries.len() as u32);
        self.block_entries.push(None);
        id
    }

    /// Place `block` at the next instruction index.
    pub fn begin_block(&mut self, block: BlockId) -> Result<()> {
        let entry = &mut self.block_entries[block.0 as usize];
        if entry.is_some() {
            return Err(BuildError::BlockPlacedTwice(block));
        }
        *entry = Some(self.instructions.len());
        Ok(())
    }

    /// Attach a source location to the next pushed instruction.
    pub fn set_location(&mut self, file: &str, line: u32) {
        self.pending_location = Some(SourceLocation {
            file: file.to_string(),
            line,
        });
    }

    /// Append an instruction; returns the operand its result binds to.
    pub fn push(&mut self, instruction: Instruction) -> Operand {
        let index = self.instructions.len();
        let result = if instruction.has_result() {
            Operand::register((self.params.len() + index) as u32)
        } else {
            Operand::INVALID
        };
        self.instructions.push(instruction);
        self.locations.push(self.pending_location.clone());
        result
    }

    fn build(self) -> Result<Function> {
        if self.instructions.is_empty() {
            return Err(BuildError::EmptyBody);
        }
        let mut block_entries = Vec::with_capacity(self.block_entries.len());
        for (i, entry) in self.block_entries.iter().enumerate() {
            block_entries.push(entry.ok_or(BuildError::UnplacedBlock(BlockId(i as u32)))?);
        }
        Ok(Function {
            name: self.name,
            params: self.params,
            instructions: self.instructions,
            locations: self.locations,
            block_entries,
            is_declaration: false,
        })
    }
}
