use std::io::Write;
use termcolor::
{
    Color,
    ColorChoice,
    ColorSpec,
    StandardStream,
    WriteColor
};

/*  The engine's entire console-reporting surface - no separate
    structured-logging crate, one banner line per target as each rule
    resolves. */
pub trait Printer
{
    fn print_single_banner_line(
        &mut self, banner_text: &str, banner_color: Color, path: &str);

    fn print(&mut self, text: &str);

    fn error(&mut self, text: &str);
}

pub struct StandardPrinter
{
}

impl StandardPrinter
{
    pub fn new() -> StandardPrinter
    {
        StandardPrinter{}
    }
}

/*  Banner vocabulary shared by every Printer implementation: the color
    a given outcome is reported in. */
pub const BUILDING: (&str, Color) = ("Building", Color::Magenta);
pub const UP_TO_DATE: (&str, Color) = ("Up-to-date", Color::Cyan);
pub const RECOVERED: (&str, Color) = ("Recovered", Color::Green);
pub const NO_DEPS_WARNING: (&str, Color) = ("No dependencies, always rebuilding", Color::Yellow);

impl Printer for StandardPrinter
{
    fn print_single_banner_line(
        &mut self, banner_text: &str, banner_color: Color, path: &str)
    {
        let mut stdout = StandardStream::stdout(ColorChoice::Always);
        match stdout.set_color(ColorSpec::new().set_fg(Some(banner_color)))
        {
            Ok(_) => {},
            Err(_error) => {},
        }
        match write!(&mut stdout, "{}: ", banner_text)
        {
            Ok(_) => {},
            Err(_error) =>
            {
                match stdout.set_color(ColorSpec::new().set_fg(None))
                {
                    Ok(_) => {},
                    Err(_error) => {},
                }
                return
            }
        }
        match stdout.set_color(ColorSpec::new().set_fg(None))
        {
            Ok(_) => {},
            Err(_error) => {},
        }
        match writeln!(&mut stdout, "{}", path)
        {
            Ok(_) => {},
            Err(_error) => {},
        }
    }

    fn print(&mut self, text: &str)
    {
        println!("{}", text);
    }

    fn error(&mut self, text: &str)
    {
        eprintln!("{}", text);
    }
}

/*  Accumulates banner lines for assertions instead of swallowing them,
    so tests can check which targets were reported as built vs
    up-to-date without capturing stdout. */
#[cfg(test)]
pub struct RecordingPrinter
{
    pub lines: Vec<(String, String)>,
}

#[cfg(test)]
impl RecordingPrinter
{
    pub fn new() -> RecordingPrinter
    {
        RecordingPrinter{ lines: Vec::new() }
    }
}

#[cfg(test)]
impl Printer for RecordingPrinter
{
    fn print_single_banner_line(
        &mut self, banner_text: &str, _banner_color: Color, path: &str)
    {
        self.lines.push((banner_text.to_string(), path.to_string()));
    }

    fn print(&mut self, _text: &str)
    {
    }

    fn error(&mut self, _text: &str)
    {
    }
}
