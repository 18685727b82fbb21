//! The compilation unit: functions, globals and their names.

use crate::function::{Function, FunctionKind};
use crate::ids::{FuncId, GlobalId};
use crate::name::{Interner, Name};
use crate::ty::Ty;

/// A global variable and its static initializer body.
#[derive(Clone, Copy, Debug)]
pub struct Global {
    pub name: Name,
    pub ty: Ty,
    /// Straight-line function computing the initial value.
    pub initializer: FuncId,
}

/// All functions and globals of one compilation unit.
pub struct Module {
    interner: Interner,
    functions: Vec<Function>,
    globals: Vec<Global>,
}

impl Module {
    pub fn new() -> Self {
        Module {
            interner: Interner::new(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Add an empty regular function.
    pub fn add_function(&mut self, name: &str) -> FuncId {
        let name = self.interner.intern(name);
        self.push_function(name, FunctionKind::Regular)
    }

    /// Add a global together with its (single-block, empty) initializer.
    pub fn add_global(&mut self, name: &str, ty: Ty) -> GlobalId {
        let name = self.interner.intern(name);
        let id = GlobalId::new(
            u32::try_from(self.globals.len())
                .unwrap_or_else(|_| panic!("global count exceeds u32::MAX")),
        );
        let initializer = self.push_function(name, FunctionKind::StaticInitializer(id));
        let init = &mut self.functions[initializer.index()];
        let entry = init.alloc_block();
        init.insert_block_after(entry, None);
        self.globals.push(Global {
            name,
            ty,
            initializer,
        });
        id
    }

    fn push_function(&mut self, name: Name, kind: FunctionKind) -> FuncId {
        let id = FuncId::new(
            u32::try_from(self.functions.len())
                .unwrap_or_else(|_| panic!("function count exceeds u32::MAX")),
        );
        self.functions.push(Function::new(id, name, kind));
        id
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    pub(crate) fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    /// All functions, initializers included.
    pub fn functions(&self) -> impl ExactSizeIterator<Item = &Function> {
        self.functions.iter()
    }

    /// Regular (non-initializer) function ids in creation order.
    pub fn regular_functions(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.functions
            .iter()
            .filter(|f| f.kind() == FunctionKind::Regular)
            .map(Function::id)
    }

    pub fn globals(&self) -> impl ExactSizeIterator<Item = GlobalId> {
        (0..self.globals.len()).map(|i| {
            #[expect(clippy::cast_possible_truncation, reason = "checked in add_global")]
            let raw = i as u32;
            GlobalId::new(raw)
        })
    }

    /// Resolve a name to its text.
    pub fn name_str(&self, name: Name) -> &str {
        self.interner.lookup(name)
    }

    /// Text of a function's name.
    pub fn function_name(&self, id: FuncId) -> &str {
        self.name_str(self.function(id).name())
    }

    /// The regular function called `name`, if exactly one exists.
    pub fn lookup_function(&self, name: &str) -> Option<FuncId> {
        let name = self.interner.get(name)?;
        unique(
            self.functions
                .iter()
                .filter(|f| f.kind() == FunctionKind::Regular && f.name() == name)
                .map(Function::id),
        )
    }

    /// The global called `name`, if exactly one exists.
    pub fn lookup_global(&self, name: &str) -> Option<GlobalId> {
        let name = self.interner.get(name)?;
        unique(
            self.globals()
                .filter(|&g| self.globals[g.index()].name == name),
        )
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

/// The single item of `it`; `None` when empty or ambiguous.
fn unique<T>(mut it: impl Iterator<Item = T>) -> Option<T> {
    let first = it.next()?;
    it.next().is_none().then_some(first)
}
