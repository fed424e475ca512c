use std::collections::BTreeMap;

use crate::digest::Digest;
use crate::error::BuildError;
use crate::fs::FileSystem;
use crate::path::Path;

/*  Persists target -> digest(deps, targets, action) across invocations.
    Stored as a single S-expression: (list (pair path hex-digest) ...).
    A missing file is an empty trace; a file that exists but fails to
    parse is TraceCorrupt rather than silently treated as empty, since
    that usually means something outside the engine touched the build
    root. */
pub struct TraceStore
{
    entries: BTreeMap<Path, Digest>,
}

impl TraceStore
{
    pub fn new() -> TraceStore
    {
        TraceStore{ entries: BTreeMap::new() }
    }

    pub fn get(&self, target: &Path) -> Option<&Digest>
    {
        self.entries.get(target)
    }

    pub fn set(&mut self, target: Path, digest: Digest)
    {
        self.entries.insert(target, digest);
    }

    pub fn load<FsType: FileSystem>(file_system: &FsType, path: &str) -> Result<TraceStore, BuildError>
    {
        if !file_system.is_file(path)
        {
            return Ok(TraceStore::new());
        }

        let text = crate::fs::util::read_file_to_string(file_system, path)
            .map_err(|error| BuildError::Io(error.to_string()))?;

        parse(&text)
            .map(|entries| TraceStore{ entries })
            .ok_or_else(|| BuildError::TraceCorrupt(path.to_string()))
    }

    pub fn dump<FsType: FileSystem>(&self, file_system: &FsType, path: &str) -> Result<(), BuildError>
    {
        let text = render(&self.entries);
        crate::fs::util::write_str_to_file(file_system, path, &text)
            .map_err(|error| BuildError::Io(error.to_string()))
    }
}

fn render(entries: &BTreeMap<Path, Digest>) -> String
{
    let mut out = String::from("(list");
    for (path, digest) in entries
    {
        out.push_str(&format!(" (pair {} {})", quote(path.as_str()), digest.human_readable()));
    }
    out.push(')');
    out
}

fn quote(text: &str) -> String
{
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/*  A hand-written reader for the small grammar above: whitespace-
    separated atoms and parenthesised lists, strings delimited by
    double quotes with backslash escapes.  Deliberately not a general
    s-expression parser - just enough to round-trip `render`'s output. */
struct Reader<'a>
{
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

enum Token
{
    Open,
    Close,
    Atom(String),
    Str(String),
}

impl<'a> Reader<'a>
{
    fn new(text: &'a str) -> Reader<'a>
    {
        Reader{ chars: text.chars().peekable() }
    }

    fn skip_whitespace(&mut self)
    {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace())
        {
            self.chars.next();
        }
    }

    fn next_token(&mut self) -> Option<Token>
    {
        self.skip_whitespace();
        match self.chars.peek()
        {
            None => None,
            Some('(') => { self.chars.next(); Some(Token::Open) },
            Some(')') => { self.chars.next(); Some(Token::Close) },
            Some('"') =>
            {
                self.chars.next();
                let mut text = String::new();
                loop
                {
                    match self.chars.next()
                    {
                        Some('\\') =>
                        {
                            if let Some(escaped) = self.chars.next()
                            {
                                text.push(escaped);
                            }
                        },
                        Some('"') => break,
                        Some(c) => text.push(c),
                        None => return None,
                    }
                }
                Some(Token::Str(text))
            },
            Some(_) =>
            {
                let mut text = String::new();
                while matches!(self.chars.peek(), Some(c) if !c.is_whitespace() && *c != '(' && *c != ')')
                {
                    text.push(self.chars.next().unwrap());
                }
                Some(Token::Atom(text))
            },
        }
    }
}

fn parse(text: &str) -> Option<BTreeMap<Path, Digest>>
{
    let mut reader = Reader::new(text);

    match reader.next_token()? { Token::Open => {}, _ => return None };
    match reader.next_token()?
    {
        Token::Atom(atom) if atom == "list" => {},
        _ => return None,
    };

    let mut entries = BTreeMap::new();
    loop
    {
        match reader.next_token()?
        {
            Token::Close => break,
            Token::Open =>
            {
                match reader.next_token()?
                {
                    Token::Atom(atom) if atom == "pair" => {},
                    _ => return None,
                };
                let path_text = match reader.next_token()? { Token::Str(s) => s, _ => return None };
                let digest_text = match reader.next_token()? { Token::Atom(s) => s, _ => return None };
                match reader.next_token()? { Token::Close => {}, _ => return None };

                let digest = Digest::from_human_readable(&digest_text).ok()?;
                entries.insert(Path::local(&path_text), digest);
            },
            _ => return None,
        }
    }

    Some(entries)
}

#[cfg(test)]
mod test
{
    use super::*;
    use crate::digest::DigestFactory;
    use crate::fs::fake::FakeFileSystem;

    #[test]
    fn empty_trace_round_trips()
    {
        let fs = FakeFileSystem::new();
        let trace = TraceStore::new();
        trace.dump(&fs, "trace.db").unwrap();
        let loaded = TraceStore::load(&fs, "trace.db").unwrap();
        assert_eq!(loaded.entries.len(), 0);
    }

    #[test]
    fn entries_round_trip()
    {
        let fs = FakeFileSystem::new();
        let mut trace = TraceStore::new();
        trace.set(Path::local("out.txt"), DigestFactory::from_str("a").result());
        trace.set(Path::local("out2.txt"), DigestFactory::from_str("b").result());
        trace.dump(&fs, "trace.db").unwrap();

        let loaded = TraceStore::load(&fs, "trace.db").unwrap();
        assert_eq!(loaded.get(&Path::local("out.txt")), trace.get(&Path::local("out.txt")));
        assert_eq!(loaded.get(&Path::local("out2.txt")), trace.get(&Path::local("out2.txt")));
    }

    #[test]
    fn missing_file_is_empty_trace()
    {
        let fs = FakeFileSystem::new();
        let trace = TraceStore::load(&fs, "nonexistent.db").unwrap();
        assert_eq!(trace.entries.len(), 0);
    }

    #[test]
    fn corrupt_file_is_an_error()
    {
        let fs = FakeFileSystem::new();
        crate::fs::util::write_str_to_file(&fs, "trace.db", "not an s-expression at all {{{").unwrap();
        let result = TraceStore::load(&fs, "trace.db");
        assert!(matches!(result, Err(BuildError::TraceCorrupt(_))));
    }
}
