/*  A named build flavour with its own build directory, e.g. "debug" vs
    "release", or per-target-platform output trees. */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Context
{
    pub name: String,
    pub build_dir: String,
}

impl Context
{
    pub fn new(name: &str, build_dir: &str) -> Context
    {
        Context{ name: name.to_string(), build_dir: build_dir.to_string() }
    }
}

/*  The handful of knobs a host constructs a BuildEngine with.  There is
    no config-file format in this crate; parsing a project's build
    description into PreRules is an external collaborator's job. */
#[derive(Clone, Debug)]
pub struct EngineConfig
{
    pub build_root: String,
    pub sandbox_by_default: bool,
    pub contexts: Vec<Context>,
}

impl EngineConfig
{
    pub fn new(build_root: &str) -> EngineConfig
    {
        EngineConfig
        {
            build_root: build_root.to_string(),
            sandbox_by_default: false,
            contexts: Vec::new(),
        }
    }

    pub fn with_sandbox_by_default(mut self, sandbox_by_default: bool) -> EngineConfig
    {
        self.sandbox_by_default = sandbox_by_default;
        self
    }

    pub fn with_context(mut self, context: Context) -> EngineConfig
    {
        self.contexts.push(context);
        self
    }

    pub fn trace_path(&self) -> String
    {
        format!("{}/.db", self.build_root)
    }

    pub fn sandbox_root(&self) -> String
    {
        format!("{}/.sandbox", self.build_root)
    }
}

impl Default for EngineConfig
{
    fn default() -> EngineConfig
    {
        EngineConfig::new("_build")
    }
}
