use std::fmt;

/*  A path is either rooted under the build tree (Local, eligible to be a
    target, eligible to be mkdir'd by the engine) or External (a source
    file somewhere else in the filesystem, read-only as far as the engine
    is concerned). */
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind
{
    Local,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path
{
    text: String,
    kind: Kind,
}

impl Path
{
    pub fn local(text: &str) -> Path
    {
        Path{ text: text.to_string(), kind: Kind::Local }
    }

    pub fn external(text: &str) -> Path
    {
        Path{ text: text.to_string(), kind: Kind::External }
    }

    pub fn as_str(&self) -> &str
    {
        &self.text
    }

    pub fn kind(&self) -> &Kind
    {
        &self.kind
    }

    pub fn is_local(&self) -> bool
    {
        self.kind == Kind::Local
    }

    /*  Parent directory, same kind, "" if the path has no separator. */
    pub fn parent(&self) -> Option<Path>
    {
        match self.text.rfind('/')
        {
            Some(index) => Some(Path{ text: self.text[..index].to_string(), kind: self.kind.clone() }),
            None => None,
        }
    }

    pub fn join(&self, segment: &str) -> Path
    {
        if self.text.is_empty()
        {
            Path{ text: segment.to_string(), kind: self.kind.clone() }
        }
        else
        {
            Path{ text: format!("{}/{}", self.text, segment), kind: self.kind.clone() }
        }
    }

}

impl fmt::Display for Path
{
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
    {
        write!(formatter, "{}", self.text)
    }
}
