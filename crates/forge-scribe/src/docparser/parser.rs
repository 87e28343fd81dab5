//! The markup parser
//!
//! [`DocParser::parse`] turns the text of one documentation comment into a
//! [`Doc`]. Parsing is a single left-to-right scan over the characters of
//! the comment. `\include` and macro expansion splice new characters into
//! the input at the cursor, so the scan continues through them as if they
//! had been written in place.
//!
//! Problems in the markup are reported to the diagnostic sink and parsing
//! carries on; only runaway `\include` recursion aborts with a fatal error.

use super::commands::Command;
use super::condition::Condition;
use super::macros::{Macro, MacroSegment, MacroTable};
use super::openedlist::{ListStyle, OpenedList};
use super::quoter::{DirectoryResolver, FileResolver, LineQuoter, Quoter};
use crate::atom::{
    Atom, AtomType, FORMATTING_BOLD, FORMATTING_INDEX, FORMATTING_ITALIC, FORMATTING_LINK,
    FORMATTING_PARAMETER, FORMATTING_SPAN, FORMATTING_SUBSCRIPT, FORMATTING_SUPERSCRIPT,
    FORMATTING_TELETYPE, FORMATTING_TRADEMARK, FORMATTING_UICONTROL, FORMATTING_UNDERLINE,
    LIST_VALUE,
};
use crate::config::ScribeConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink, ScribeError, ScribeResult};
use crate::doc::{AnchorDef, ComparisonCategory, Doc, DocPrivate, Topic};
use crate::location::{Location, LocationStack};
use crate::text::Text;
use crate::utils::{nearest_name, simplified};
use std::collections::{BTreeMap, HashMap, HashSet};

const MAX_INCLUDE_DEPTH: usize = 16;

/// Parses documentation comments against one configuration
pub struct DocParser<'a> {
    config: &'a ScribeConfig,
    macros: &'a MacroTable,
    condition: &'a Condition,
    includes: Box<dyn FileResolver + 'a>,
    examples: Box<dyn FileResolver + 'a>,
}

impl<'a> DocParser<'a> {
    /// `\include` files are looked up in the configured include paths,
    /// quoted files in the example paths.
    pub fn new(config: &'a ScribeConfig, macros: &'a MacroTable, condition: &'a Condition) -> Self {
        Self {
            config,
            macros,
            condition,
            includes: Box::new(DirectoryResolver::new(config.include_paths.iter().cloned())),
            examples: Box::new(DirectoryResolver::new(config.example_paths.iter().cloned())),
        }
    }

    pub fn with_include_resolver(mut self, resolver: impl FileResolver + 'a) -> Self {
        self.includes = Box::new(resolver);
        self
    }

    pub fn with_example_resolver(mut self, resolver: impl FileResolver + 'a) -> Self {
        self.examples = Box::new(resolver);
        self
    }

    /// Parse `source`, the text of a comment starting at `location`.
    ///
    /// `meta_commands` names the commands recorded verbatim with their
    /// arguments; those also found in `topics` additionally register a
    /// topic.
    pub fn parse(
        &self,
        source: &str,
        location: Location,
        meta_commands: &HashSet<String>,
        topics: &HashSet<String>,
        sink: &mut dyn DiagnosticSink,
    ) -> ScribeResult<Doc> {
        let mut scan = Scan::new(self, source, location.clone(), meta_commands, topics, sink);
        scan.run()?;
        let end = scan.location();
        let mut private = std::mem::take(&mut scan.private);
        private.start_loc = location;
        private.end_loc = end;
        private.source = source.to_string();
        tracing::debug!(
            atoms = private.text.len(),
            start = %private.start_loc,
            "comment parsed"
        );
        Ok(Doc::from_private(private))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paragraph {
    Outside,
    SingleLine,
    MultiLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgMode {
    Normal,
    /// No macro expansion, whitespace kept as written
    Verbatim,
    /// Formatting commands inside macro arguments are left for the
    /// expansion to interpret
    MacroArguments,
}

/// State of one parse
struct Scan<'s, 'a> {
    parser: &'s DocParser<'a>,
    sink: &'s mut dyn DiagnosticSink,
    meta_commands: &'s HashSet<String>,
    topics: &'s HashSet<String>,

    input: Vec<char>,
    pos: usize,
    backslash_pos: usize,
    end_pos: usize,

    locations: LocationStack,
    cached_pos: usize,
    /// End positions of text spliced in by `\include`
    opened_inputs: Vec<usize>,

    private: DocPrivate,

    paragraph: Paragraph,
    in_table_header: bool,
    in_table_row: bool,
    in_table_item: bool,
    index_started_paragraph: bool,
    pending_left: AtomType,
    pending_right: AtomType,
    pending_string: String,

    brace_depth: i32,
    current_section: u8,
    opened_commands: Vec<Command>,
    opened_lists: Vec<OpenedList>,
    /// Formats opened with `{`, keyed by the brace depth that closes them
    pending_formats: BTreeMap<i32, String>,
    last_atom: Option<usize>,
    current_link_atom: Option<usize>,
    target_map: HashMap<String, Location>,

    preprocessor_skipping: Vec<bool>,
    num_skipping: usize,

    quoter: Box<dyn Quoter>,
}

impl<'s, 'a> Scan<'s, 'a> {
    fn new(
        parser: &'s DocParser<'a>,
        source: &str,
        location: Location,
        meta_commands: &'s HashSet<String>,
        topics: &'s HashSet<String>,
        sink: &'s mut dyn DiagnosticSink,
    ) -> Self {
        Self {
            parser,
            sink,
            meta_commands,
            topics,
            input: source.chars().collect(),
            pos: 0,
            backslash_pos: 0,
            end_pos: 0,
            locations: LocationStack::new(location),
            cached_pos: 0,
            opened_inputs: Vec::new(),
            private: DocPrivate::default(),
            paragraph: Paragraph::Outside,
            in_table_header: false,
            in_table_row: false,
            in_table_item: false,
            index_started_paragraph: false,
            pending_left: AtomType::Nop,
            pending_right: AtomType::Nop,
            pending_string: String::new(),
            brace_depth: 0,
            current_section: 0,
            opened_commands: vec![Command::Omit],
            opened_lists: Vec::new(),
            pending_formats: BTreeMap::new(),
            last_atom: None,
            current_link_atom: None,
            target_map: HashMap::new(),
            preprocessor_skipping: Vec::new(),
            num_skipping: 0,
            quoter: Box::new(LineQuoter::new()),
        }
    }

    fn run(&mut self) -> ScribeResult<()> {
        while let Some(ch) = self.ch(self.pos) {
            match ch {
                '\\' => self.backslash()?,
                '-' => self.dashes(),
                '{' => {
                    self.enter_para();
                    self.append_char('{');
                    self.brace_depth += 1;
                    self.pos += 1;
                }
                '}' => self.close_brace(),
                '/' if self.is_line_comment_at(self.pos) => {
                    self.pos += 2;
                    self.get_rest_of_line();
                    if self.pos > 0 && self.input[self.pos - 1] == '\n' {
                        self.pos -= 1;
                    }
                }
                _ => self.text_char(ch),
            }
        }
        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        self.leave_value_list();

        if self.top_command() == Command::Legalese {
            self.append(Atom::bare(AtomType::LegaleseRight));
            self.opened_commands.pop();
        }

        let top = self.top_command();
        if top != Command::Omit {
            self.warn(format!("Missing '\\{}'", top.end_command().name()));
        } else if !self.preprocessor_skipping.is_empty() {
            self.warn(format!("Missing '\\{}'", Command::EndIf.name()));
        }

        if self.current_section != 0 {
            let level = self.current_section.to_string();
            self.append(Atom::new(AtomType::SectionRight, level));
            self.current_section = 0;
        }
    }

    // ----- characters -----

    fn ch(&self, i: usize) -> Option<char> {
        self.input.get(i).copied()
    }

    fn is_line_comment_at(&self, i: usize) -> bool {
        i + 2 < self.input.len() && self.input[i + 1] == '/' && self.input[i + 2] == '!'
    }

    fn dashes(&mut self) {
        self.enter_para();
        let mut count = 0;
        while self.ch(self.pos) == Some('-') {
            count += 1;
            self.pos += 1;
        }
        match count {
            3 => self.append_char('\u{2014}'),
            2 => self.append_char('\u{2013}'),
            _ => (0..count).for_each(|_| self.append_char('-')),
        }
    }

    fn close_brace(&mut self) {
        self.brace_depth -= 1;
        self.pos += 1;

        let Some(format) = self.pending_formats.remove(&self.brace_depth) else {
            self.enter_para();
            self.append_char('}');
            return;
        };

        let last = self
            .private
            .text
            .last_atom()
            .map(|a| a.string().to_string())
            .unwrap_or_default();
        self.append(Atom::new(AtomType::FormattingRight, format.as_str()));

        if format == FORMATTING_INDEX {
            if self.index_started_paragraph {
                self.skip_all_spaces();
            }
        } else if format == FORMATTING_LINK {
            // \l{QString::}{count()} links to QString::count()
            if let Some(link) = self.current_link_atom.take() {
                let text = &mut self.private.text;
                let right = text.len() - 1;
                if text.get(link).is_some_and(|a| a.string().ends_with("::")) {
                    let suffix = text.sub_range(link, right).to_plain_string();
                    if let Some(atom) = text.get_mut(link) {
                        atom.append_str(&suffix);
                    }
                }
            }
        } else if format == FORMATTING_TRADEMARK {
            if let Some(atom) = self.private.text.last_atom_mut() {
                atom.add_string(last);
            }
        }
    }

    fn text_char(&mut self, ch: char) {
        let new_word = match self.paragraph {
            Paragraph::Outside => {
                if ch.is_whitespace() {
                    self.pos += 1;
                    false
                } else {
                    self.enter_para();
                    true
                }
            }
            _ if ch.is_whitespace() => {
                self.pos += 1;
                if ch == '\n' && (self.paragraph == Paragraph::SingleLine || self.is_blank_line()) {
                    self.leave_para();
                    false
                } else {
                    self.append_char(' ');
                    true
                }
            }
            _ => true,
        };
        if !new_word {
            return;
        }

        let start = self.pos;
        let in_link = self
            .pending_formats
            .values()
            .next_back()
            .is_some_and(|f| f == FORMATTING_LINK);
        let autolink = !in_link && scan_auto_link(&self.input, &mut self.pos);

        if self.pos == start {
            if !ch.is_whitespace() {
                self.append_char(ch);
                self.pos += 1;
            }
            return;
        }

        let word: String = self.input[start..self.pos].iter().collect();
        let ignored = self.parser.config.ignore_words.iter().any(|w| *w == word) || word.starts_with("__");
        if autolink && !ignored {
            self.append(Atom::new(AtomType::AutoLink, word));
        } else {
            self.append_word(&word);
        }
    }

    // ----- commands -----

    fn backslash(&mut self) -> ScribeResult<()> {
        self.backslash_pos = self.pos;
        self.pos += 1;
        let start = self.pos;
        while self.ch(self.pos).is_some_and(char::is_alphanumeric) {
            self.pos += 1;
        }
        self.end_pos = self.pos;
        let name: String = self.input[start..self.pos].iter().collect();

        if name.is_empty() {
            if let Some(c) = self.ch(self.pos) {
                self.enter_para();
                if c.is_whitespace() {
                    self.skip_all_spaces();
                    self.append_char(' ');
                } else {
                    self.append_char(c);
                    self.pos += 1;
                }
            }
            return Ok(());
        }

        // quoting atoms must not become the target of appended code
        if !self.quoting() || !is_quote(self.private.text.last_type()) {
            self.last_atom = self.private.text.last_index();
        }

        tracing::trace!(command = %name, "markup command");
        match Command::from_name(&name) {
            Some(cmd) => self.command(cmd),
            None => {
                self.other_command(&name);
                Ok(())
            }
        }
    }

    fn command(&mut self, cmd: Command) -> ScribeResult<()> {
        use Command::*;

        match cmd {
            A => {
                self.enter_para();
                let p1 = self.get_argument(ArgMode::Normal);
                self.append(Atom::new(AtomType::FormattingLeft, FORMATTING_PARAMETER));
                self.append(Atom::new(AtomType::String, p1.as_str()));
                self.append(Atom::new(AtomType::FormattingRight, FORMATTING_PARAMETER));
                self.private.params.insert(p1);
            }
            AnnotatedList => {
                let p2 = self.optional_bracketed_argument();
                let p1 = self.get_argument(ArgMode::Normal);
                self.append(Atom::with_two(AtomType::AnnotatedList, p1, p2));
            }
            B | Bold => {
                if cmd == Bold {
                    self.warn("'\\bold' is deprecated. Use '\\b'");
                }
                self.start_format(FORMATTING_BOLD, cmd);
            }
            Br => {
                self.enter_para();
                self.append(Atom::bare(AtomType::BR));
            }
            Brief => self.enter_block_para(AtomType::BriefLeft, AtomType::BriefRight),
            C => {
                self.enter_para();
                let arg = self.get_argument(ArgMode::Verbatim);
                let code = untabify(&arg, self.tab_size());
                self.append(Atom::new(AtomType::C, code));
            }
            Caption => self.enter_block_para(AtomType::CaptionLeft, AtomType::CaptionRight),
            Code | BadCode | Qml => {
                self.leave_para();
                let args = self.get_meta_command_argument(cmd.name());
                let code = self.get_code(cmd, &args);
                let atom_type = match cmd {
                    Code => AtomType::Code,
                    BadCode => AtomType::CodeBad,
                    _ => AtomType::Qml,
                };
                self.append(Atom::new(atom_type, code));
            }
            CodeLine | Dots => {
                let arg = match cmd {
                    Dots => {
                        let arg = self.get_optional_argument();
                        if arg.is_empty() {
                            "4".to_string()
                        } else {
                            arg
                        }
                    }
                    _ => " ".to_string(),
                };
                self.quote_atoms(cmd, &arg);
                if let Some(atom) = self.last_atom.and_then(|i| self.private.text.get_mut(i)) {
                    if is_code(atom.atom_type()) && atom.string().ends_with("\n\n") {
                        atom.chop();
                    }
                }
                if cmd == CodeLine {
                    self.append_to_code("\n");
                } else {
                    let indent = arg.trim().parse::<usize>().unwrap_or(0);
                    self.append_to_code(&format!("{}...\n", " ".repeat(indent)));
                }
            }
            ComparesWith => {
                self.leave_para();
                let p1 = self.get_rest_of_line();
                if self.open_command(cmd) {
                    self.append(Atom::new(AtomType::ComparesLeft, p1));
                }
            }
            EndComparesWith => {
                if self.close_command(cmd) {
                    self.leave_para();
                    self.append(Atom::bare(AtomType::ComparesRight));
                    self.process_compares_with();
                }
            }
            Details => {
                self.leave_para();
                let p1 = self.get_argument(ArgMode::Normal);
                self.append(Atom::new(AtomType::DetailsLeft, p1));
                self.opened_commands.push(cmd);
            }
            EndDetails => {
                self.leave_para();
                self.append(Atom::bare(AtomType::DetailsRight));
                self.close_command(cmd);
            }
            Div => {
                self.leave_para();
                let p1 = self.get_argument(ArgMode::Verbatim);
                self.append(Atom::new(AtomType::DivLeft, p1));
                self.opened_commands.push(cmd);
            }
            EndDiv => {
                self.leave_para();
                self.append(Atom::bare(AtomType::DivRight));
                self.close_command(cmd);
            }
            E | I => {
                if cmd == I {
                    self.warn("'\\i' is deprecated. Use '\\e' for italic or '\\li' for list item");
                }
                self.start_format(FORMATTING_ITALIC, cmd);
            }
            If => {
                let condition = self.get_rest_of_line();
                let skip = !self.parser.condition.is_true(&condition);
                self.preprocessor_skipping.push(skip);
                if skip {
                    self.num_skipping += 1;
                }
                if self.num_skipping > 0 {
                    self.skip_to_next_preprocessor();
                }
            }
            Else => match self.preprocessor_skipping.last_mut() {
                Some(top) => {
                    if *top {
                        self.num_skipping = self.num_skipping.saturating_sub(1);
                    } else {
                        self.num_skipping += 1;
                    }
                    *top = !*top;
                    self.get_rest_of_line();
                    if self.num_skipping > 0 {
                        self.skip_to_next_preprocessor();
                    }
                }
                None => self.warn(format!("Unexpected '\\{}'", Else.name())),
            },
            EndIf => match self.preprocessor_skipping.pop() {
                Some(skipping) => {
                    if skipping {
                        self.num_skipping = self.num_skipping.saturating_sub(1);
                    }
                    self.get_rest_of_line();
                    if self.num_skipping > 0 {
                        self.skip_to_next_preprocessor();
                    }
                }
                None => self.warn(format!("Unexpected '\\{}'", EndIf.name())),
            },
            EndCode | EndQml | EndOmit => {
                self.close_command(cmd);
            }
            EndFootnote | EndLegalese | EndQuotation | EndSidebar => {
                if self.close_command(cmd) {
                    self.leave_para();
                    let right = match cmd {
                        EndFootnote => AtomType::FootnoteRight,
                        EndLegalese => AtomType::LegaleseRight,
                        EndQuotation => AtomType::QuotationRight,
                        _ => AtomType::SidebarRight,
                    };
                    self.append(Atom::bare(right));
                }
            }
            EndLink => {
                if self.close_command(cmd) {
                    if let Some(last) = self.private.text.last_atom_mut() {
                        if last.atom_type() == AtomType::String && last.string().ends_with(' ') {
                            last.chop();
                        }
                    }
                    self.append(Atom::new(AtomType::FormattingRight, FORMATTING_LINK));
                }
            }
            EndList => {
                if self.close_command(cmd) {
                    self.leave_para();
                    if let Some(list) = self.opened_lists.pop() {
                        if list.is_started() {
                            self.append(Atom::new(AtomType::ListItemRight, list.style_string()));
                            self.append(Atom::new(AtomType::ListRight, list.style_string()));
                        }
                    }
                }
            }
            EndRaw => self.warn(format!("Unexpected '\\{}'", EndRaw.name())),
            EndSection1 | EndSection2 | EndSection3 | EndSection4 => self.end_section(),
            EndTable => {
                if self.close_command(cmd) {
                    self.leave_table_row();
                    self.append(Atom::bare(AtomType::TableRight));
                }
            }
            EndMapRef | Cpp | EndCpp | CppText | EndCppText => {}
            Footnote => {
                if self.open_command(cmd) {
                    self.enter_para();
                    self.append(Atom::bare(AtomType::FootnoteLeft));
                }
            }
            GenerateList => {
                let p2 = self.optional_bracketed_argument();
                let mut p1 = self.get_argument(ArgMode::Normal);
                let extra = self.get_optional_argument();
                if !extra.is_empty() {
                    p1.push(' ');
                    p1.push_str(&extra);
                }
                self.append(Atom::with_two(AtomType::GeneratedList, p1, p2));
            }
            Header => {
                if self.top_command() == Table {
                    self.leave_table_row();
                    self.append(Atom::bare(AtomType::TableHeaderLeft));
                    self.in_table_header = true;
                } else {
                    self.warn_outside_table(cmd);
                }
            }
            Hr => {
                self.leave_para();
                self.append(Atom::bare(AtomType::HR));
            }
            Image => {
                self.leave_value_list();
                let p1 = self.get_argument(ArgMode::Normal);
                self.append(Atom::new(AtomType::Image, p1));
                let alt = self.get_rest_of_line();
                self.append(Atom::new(AtomType::ImageText, alt));
            }
            Important => self.enter_block_para(AtomType::ImportantLeft, AtomType::ImportantRight),
            Include | Input => {
                let file = self.get_argument(ArgMode::Normal);
                let mut params = Vec::new();
                let identifier = if self.is_left_brace_ahead() {
                    let identifier = self.get_argument(ArgMode::Normal);
                    while self.is_left_brace_ahead() && params.len() < 9 {
                        params.push(self.get_argument(ArgMode::Normal));
                    }
                    identifier
                } else {
                    self.get_rest_of_line()
                };
                self.include(&file, &identifier, &params)?;
            }
            InlineImage => {
                self.enter_para();
                let p1 = self.get_argument(ArgMode::Normal);
                self.append(Atom::new(AtomType::InlineImage, p1));
                if self.is_left_brace_ahead() {
                    let alt = self.get_argument(ArgMode::Normal);
                    self.append(Atom::new(AtomType::ImageText, alt));
                    self.append(Atom::new(AtomType::String, " "));
                }
            }
            Index => {
                if self.paragraph == Paragraph::Outside {
                    self.enter_para();
                    self.index_started_paragraph = true;
                } else if self.index_started_paragraph {
                    let closes_index = self.private.text.last_atom().is_some_and(|a| {
                        a.atom_type() == AtomType::FormattingRight && a.string() == FORMATTING_INDEX
                    });
                    if !closes_index {
                        self.index_started_paragraph = false;
                    }
                }
                self.start_format(FORMATTING_INDEX, cmd);
            }
            Keyword => {
                self.leave_para();
                let keyword = self.get_rest_of_line();
                self.insert_anchor(true, keyword);
            }
            L => {
                self.enter_para();
                let p2 = self.optional_bracketed_argument();
                let p1 = self.get_argument(ArgMode::Normal);
                self.append(Atom::link(p1.as_str(), p2));
                if self.is_left_brace_ahead() {
                    self.current_link_atom = self.private.text.last_index();
                    self.start_format(FORMATTING_LINK, cmd);
                } else {
                    self.append(Atom::new(AtomType::FormattingLeft, FORMATTING_LINK));
                    self.append(Atom::new(AtomType::String, clean_link(&p1)));
                    self.append(Atom::new(AtomType::FormattingRight, FORMATTING_LINK));
                }
            }
            Legalese => {
                self.leave_para();
                if self.open_command(cmd) {
                    self.append(Atom::bare(AtomType::LegaleseLeft));
                }
                self.private.has_legalese = true;
            }
            Link => {
                if self.open_command(cmd) {
                    self.enter_para();
                    let p1 = self.get_argument(ArgMode::Normal);
                    self.append(Atom::link(p1, ""));
                    self.append(Atom::new(AtomType::FormattingLeft, FORMATTING_LINK));
                    self.skip_spaces_or_one_endl();
                }
            }
            List => {
                if self.open_command(cmd) {
                    self.leave_para();
                    let hint = self.get_optional_argument();
                    let list = match OpenedList::from_hint(&hint) {
                        Some(list) => list,
                        None => {
                            self.warn(format!("Unrecognized list style '{}'", hint));
                            OpenedList::new(ListStyle::Bullet)
                        }
                    };
                    self.opened_lists.push(list);
                }
            }
            Li | O => {
                if cmd == O {
                    self.warn("'\\o' is deprecated. Use '\\li'");
                }
                self.list_item(cmd);
            }
            Meta => {
                let name = self.get_argument(ArgMode::Normal);
                let value = self.get_argument(ArgMode::Normal);
                self.private.meta_map.entry(name).or_default().push(value);
            }
            Note => self.enter_block_para(AtomType::NoteLeft, AtomType::NoteRight),
            Omit => {
                self.get_until_end(cmd);
            }
            OmitValue => self.omit_value(),
            Overload => self.overload(),
            PrintLine | PrintTo | PrintUntil | SkipLine | SkipTo | SkipUntil => {
                self.leave_para();
                let rest = self.get_rest_of_line();
                self.quote_atoms(cmd, &rest);
                let location = self.location();
                let sink = &mut *self.sink;
                let quoted = match cmd {
                    PrintLine | SkipLine => self.quoter.quote_line(&location, cmd.name(), &rest, sink),
                    PrintTo | SkipTo => self.quoter.quote_to(&location, cmd.name(), &rest, sink),
                    _ => self.quoter.quote_until(&location, cmd.name(), &rest, sink),
                };
                if matches!(cmd, PrintLine | PrintTo | PrintUntil) {
                    self.append_to_code(&quoted);
                }
            }
            Quotation => {
                if self.open_command(cmd) {
                    self.leave_para();
                    self.append(Atom::bare(AtomType::QuotationLeft));
                }
            }
            QuoteFile => {
                self.leave_para();
                let file = self.get_argument(ArgMode::Normal);
                self.quote_from_file(&file);
                self.quote_atoms(cmd, &file);
                let location = self.location();
                let code = self.quoter.quote_to(&location, cmd.name(), "", &mut *self.sink);
                self.append(Atom::new(AtomType::Code, code));
                self.quoter.reset();
            }
            QuoteFromFile => {
                self.leave_para();
                let file = self.get_argument(ArgMode::Normal);
                self.quote_atoms(cmd, &file);
                self.quote_from_file(&file);
            }
            Raw => {
                self.leave_para();
                let format = self.get_rest_of_line();
                if format.is_empty() {
                    self.warn(format!("Missing format name after '\\{}'", Raw.name()));
                }
                let body = self.get_until_end(cmd);
                let body = untabify(&body, self.tab_size());
                self.append(Atom::new(AtomType::FormatIf, format));
                self.append(Atom::new(AtomType::RawString, body));
                self.append(Atom::bare(AtomType::FormatElse));
                self.append(Atom::bare(AtomType::FormatEndif));
            }
            Row => {
                if self.top_command() == Table {
                    let p1 = if self.is_left_brace_ahead() {
                        self.get_argument(ArgMode::Verbatim)
                    } else {
                        String::new()
                    };
                    self.leave_table_row();
                    self.append(Atom::new(AtomType::TableRowLeft, p1));
                    self.in_table_row = true;
                } else {
                    self.warn_outside_table(cmd);
                }
            }
            Sa => self.parse_also(),
            Section1 | Section2 | Section3 | Section4 => {
                if let Some(level) = cmd.section_level() {
                    self.start_section(level);
                }
            }
            Sidebar => {
                if self.open_command(cmd) {
                    self.leave_para();
                    self.append(Atom::bare(AtomType::SidebarLeft));
                }
            }
            SinceList => {
                self.leave_para();
                let rest = self.get_rest_of_line();
                self.append(Atom::new(AtomType::SinceList, simplified(&rest)));
            }
            Snippet => {
                self.leave_para();
                let file = self.get_argument(ArgMode::Normal);
                let identifier = self.get_rest_of_line();
                if self.quoting() {
                    self.append(Atom::new(AtomType::SnippetCommand, cmd.name()));
                    self.append(Atom::new(AtomType::SnippetLocation, file.as_str()));
                    self.append(Atom::new(AtomType::SnippetIdentifier, identifier.as_str()));
                }
                let code_type = if file.ends_with(".qml") {
                    AtomType::Qml
                } else {
                    AtomType::Code
                };
                self.quote_from_file(&file);
                let location = self.location();
                let quoted = self.quoter.quote_snippet(&location, &identifier, &mut *self.sink);
                self.append_to_code_as(&quoted, code_type);
            }
            Span => {
                let class = self.get_argument(ArgMode::Verbatim);
                self.start_format(&format!("{}{}", FORMATTING_SPAN, class), cmd);
            }
            Sub => self.start_format(FORMATTING_SUBSCRIPT, cmd),
            Sup => self.start_format(FORMATTING_SUPERSCRIPT, cmd),
            Table => {
                self.leave_value_list();
                let p1 = self.get_optional_argument();
                let p2 = self.get_optional_argument();
                if self.open_command(cmd) {
                    self.leave_para();
                    self.append(Atom::with_two(AtomType::TableLeft, p1, p2));
                    self.in_table_header = false;
                    self.in_table_row = false;
                    self.in_table_item = false;
                }
            }
            TableOfContents => {
                let depth = if self.is_left_brace_ahead() {
                    self.get_argument(ArgMode::Normal)
                } else {
                    "1".to_string()
                };
                let unit = self.get_sectioning_unit();
                self.append(Atom::new(AtomType::TableOfContents, format!("{},{}", depth, unit)));
            }
            Target => {
                if self.top_command() == Table && !self.in_table_item {
                    self.warn(
                        "Found a \\target command outside table item in a table.\n\
                         Move the \\target inside the \\li to resolve this warning.",
                    );
                }
                let target = self.get_rest_of_line();
                self.insert_anchor(false, target);
            }
            Tm => {
                // \tm is ignored inside section headings
                if self.paragraph != Paragraph::SingleLine {
                    self.start_format(FORMATTING_TRADEMARK, cmd);
                }
            }
            Tt => self.start_format(FORMATTING_TELETYPE, cmd),
            UiControl => self.start_format(FORMATTING_UICONTROL, cmd),
            Underline => self.start_format(FORMATTING_UNDERLINE, cmd),
            Unicode => {
                self.enter_para();
                let p1 = self.get_argument(ArgMode::Normal);
                match parse_unicode(&p1) {
                    Some(c) => self.append(Atom::new(AtomType::String, c.to_string())),
                    None => self.warn(format!(
                        "Invalid Unicode character '{}' specified with '\\{}'",
                        p1,
                        Unicode.name()
                    )),
                }
            }
            Value => self.value(),
            Warning => self.enter_block_para(AtomType::WarningLeft, AtomType::WarningRight),
        }
        Ok(())
    }

    /// A name that is not a built-in command: a meta-command, a macro, a
    /// word that happens to follow a backslash, or a mistake
    fn other_command(&mut self, name: &str) {
        let meta_commands = self.meta_commands;
        let parser = self.parser;

        if meta_commands.contains(name) {
            self.private.metacommands_used.insert(name.to_string());
            let bracketed = self.optional_bracketed_argument();
            let mut arg = String::new();
            if self.pos < self.input.len() && (name == "obsolete" || name == "deprecated") {
                // whatever follows starts a new paragraph
                self.input[self.pos] = '\n';
            } else {
                arg = self.get_meta_command_argument(name);
            }
            self.private
                .meta_command_map
                .entry(name.to_string())
                .or_default()
                .push((arg.clone(), bracketed));
            if self.topics.contains(name) && !name.ends_with("propertygroup") {
                self.private.topics.push(Topic::new(name, arg));
            }
        } else if let Some(macro_def) = parser.macros.get(name) {
            self.invoke_macro(name, macro_def);
        } else if is_auto_link_string(name) {
            self.append_word(name);
        } else {
            if !name.ends_with("propertygroup") {
                let mut candidates: Vec<&str> = Command::names().collect();
                candidates.extend(meta_commands.iter().map(String::as_str));
                let location = self.location();
                let mut diagnostic =
                    Diagnostic::warning(format!("Unknown command '\\{}'", name)).at_location(&location);
                if let Some(best) = nearest_name(name, candidates) {
                    diagnostic = diagnostic.with_details(format!("Maybe you meant '\\{}'?", best));
                }
                self.sink.report(diagnostic);
            }
            self.enter_para();
            self.append(Atom::new(AtomType::UnknownCommand, name));
        }
    }

    fn invoke_macro(&mut self, name: &str, macro_def: &Macro) {
        let variants = macro_def.formats.len();
        if variants > 0 {
            let args = self.get_macro_arguments(name, macro_def);
            for (i, (format, def)) in macro_def.formats.iter().enumerate() {
                self.append(Atom::new(AtomType::FormatIf, format.as_str()));
                for segment in Macro::segments(def, &args) {
                    match segment {
                        MacroSegment::Raw(raw) => self.append(Atom::new(AtomType::RawString, raw)),
                        MacroSegment::Arg(arg) => self.append(Atom::new(AtomType::String, arg)),
                    }
                }
                if i + 1 < variants {
                    self.append(Atom::bare(AtomType::FormatElse));
                }
            }
            for _ in 0..variants {
                self.append(Atom::bare(AtomType::FormatEndif));
            }
        }

        if macro_def.has_default() {
            if variants > 0 {
                self.warn("Macro cannot have both format-specific and qdoc-syntax definitions");
            } else {
                let expanded = self.expand_macro_to_string(name, macro_def);
                self.splice(self.backslash_pos, self.pos, &expanded);
                self.pos = self.backslash_pos;
            }
        }
    }

    fn expand_macro_to_string(&mut self, name: &str, macro_def: &Macro) -> String {
        let args = if macro_def.num_params == 0 {
            Vec::new()
        } else {
            self.get_macro_arguments(name, macro_def)
        };
        macro_def.expand_default(&args)
    }

    fn get_macro_arguments(&mut self, name: &str, macro_def: &Macro) -> Vec<String> {
        let mut args = Vec::new();
        for i in 1..=macro_def.num_params {
            if macro_def.num_params == 1 || self.is_left_brace_ahead() {
                args.push(self.get_argument(ArgMode::MacroArguments));
            } else {
                self.warn(format!(
                    "Macro '\\{}' invoked with too few arguments (expected {}, got {})",
                    name,
                    macro_def.num_params,
                    i - 1
                ));
                break;
            }
        }
        args
    }

    /// Expand a macro met while reading an argument. Returns true when
    /// the expansion was spliced in at the cursor.
    fn expand_macro(&mut self, mode: ArgMode) -> bool {
        if mode == ArgMode::Verbatim {
            return false;
        }
        let backslash = self.pos;
        self.pos += 1;
        let start = self.pos;
        while self.ch(self.pos).is_some_and(char::is_alphanumeric) {
            self.pos += 1;
        }
        self.end_pos = self.pos;
        let name: String = self.input[start..self.pos].iter().collect();

        if !name.is_empty() {
            let parser = self.parser;
            match parser.macros.get(&name) {
                Some(macro_def) if macro_def.has_default() => {
                    let expanded = self.expand_macro_to_string(&name, macro_def);
                    self.splice(backslash, self.pos, &expanded);
                    self.pos = backslash;
                    return true;
                }
                Some(_) => self.warn(format!("Macro '{}' does not have a default definition", name)),
                None => {
                    self.pos = backslash;
                    let formatting = Command::from_name(&name).is_some_and(Command::is_formatting);
                    if mode != ArgMode::MacroArguments || !formatting {
                        self.warn(format!("Unknown macro '{}'", name));
                        self.pos += 1;
                    }
                }
            }
        } else if self.ch(self.pos).is_some_and(char::is_whitespace) {
            self.skip_all_spaces();
        } else if self.ch(self.pos) == Some('\\') {
            // "\\" stands for one backslash
            self.input.remove(self.pos);
            self.shift_opened_inputs(self.pos, -1);
            self.pos -= 1;
        }
        false
    }

    fn splice(&mut self, from: usize, to: usize, replacement: &str) {
        let to = to.min(self.input.len());
        let inserted = replacement.chars().count();
        self.input.splice(from..to, replacement.chars());
        self.shift_opened_inputs(from, inserted as isize - (to - from) as isize);
    }

    /// Keep the ends of enclosing inclusions in place after the input
    /// changed length at `at`
    fn shift_opened_inputs(&mut self, at: usize, delta: isize) {
        for end in self.opened_inputs.iter_mut().filter(|end| **end > at) {
            *end = end.saturating_add_signed(delta);
        }
    }

    fn list_item(&mut self, cmd: Command) {
        self.leave_para();
        match self.top_command() {
            Command::List => {
                if let Some(list) = self.opened_lists.last_mut() {
                    let style = list.style_string();
                    let opener = if list.is_started() {
                        AtomType::ListItemRight
                    } else {
                        AtomType::ListLeft
                    };
                    list.next();
                    let number = list.number_string();
                    self.append(Atom::new(opener, style));
                    self.append(Atom::new(AtomType::ListItemNumber, number));
                    self.append(Atom::new(AtomType::ListItemLeft, style));
                }
                self.enter_para();
            }
            Command::Table => {
                let mut p1 = "1,1".to_string();
                let mut p2 = String::new();
                if self.is_left_brace_ahead() {
                    p1 = self.get_argument(ArgMode::Normal);
                    if self.is_left_brace_ahead() {
                        p2 = self.get_argument(ArgMode::Normal);
                    }
                }
                if !self.in_table_header && !self.in_table_row {
                    self.warn(format!(
                        "Missing '\\{}' or '\\{}' before '\\{}'",
                        Command::Header.name(),
                        Command::Row.name(),
                        Command::Li.name()
                    ));
                    self.append(Atom::bare(AtomType::TableRowLeft));
                    self.in_table_row = true;
                } else if self.in_table_item {
                    self.append(Atom::bare(AtomType::TableItemRight));
                    self.in_table_item = false;
                }
                self.append(Atom::with_two(AtomType::TableItemLeft, p1, p2));
                self.in_table_item = true;
            }
            _ => self.warn(format!(
                "Command '\\{}' outside of '\\{}' and '\\{}'",
                cmd.name(),
                Command::List.name(),
                Command::Table.name()
            )),
        }
    }

    fn warn_outside_table(&mut self, cmd: Command) {
        let top = self.top_command();
        if self.opened_commands.contains(&Command::Table) {
            self.warn(format!("Cannot use '\\{}' within '\\{}'", cmd.name(), top.name()));
        } else {
            self.warn(format!(
                "Cannot use '\\{}' outside of '\\{}'",
                cmd.name(),
                Command::Table.name()
            ));
        }
    }

    fn value(&mut self) {
        self.leave_value();
        if self.opened_lists.last().map(OpenedList::style) != Some(ListStyle::Value) {
            return;
        }

        let mut p1 = self.get_argument(ArgMode::Normal);
        let mut since = String::new();
        if p1.starts_with("[since ") && p1.ends_with(']') {
            since = p1["[since ".len()..p1.len() - 1].to_string();
            p1 = self.get_argument(ArgMode::Normal);
        }
        if !self.private.enum_items.contains(&p1) {
            self.private.enum_items.push(p1.clone());
        }
        if let Some(list) = self.opened_lists.last_mut() {
            list.next();
        }

        self.append(Atom::new(AtomType::ListTagLeft, LIST_VALUE));
        self.append(Atom::new(AtomType::String, p1));
        self.append(Atom::new(AtomType::ListTagRight, LIST_VALUE));
        if !since.is_empty() {
            self.append(Atom::new(AtomType::SinceTagLeft, LIST_VALUE));
            self.append(Atom::new(AtomType::String, since));
            self.append(Atom::new(AtomType::SinceTagRight, LIST_VALUE));
        }
        self.append(Atom::new(AtomType::ListItemLeft, LIST_VALUE));

        self.skip_spaces_or_one_endl();
        if self.is_blank_line() {
            self.append(Atom::bare(AtomType::Nop));
        }
    }

    fn omit_value(&mut self) {
        self.leave_para();
        let p1 = self.get_argument(ArgMode::Normal);
        if !self.private.enum_items.contains(&p1) {
            self.private.enum_items.push(p1.clone());
        }
        if !self.private.omit_enum_items.contains(&p1) {
            self.private.omit_enum_items.push(p1);
        }

        // drop the description paragraph of the omitted value
        self.skip_spaces_or_one_endl();
        while self.pos < self.input.len() && !self.is_blank_line() {
            self.skip_all_spaces();
            if self.ch(self.pos) == Some('\\') {
                let mut end = self.pos + 1;
                while self.ch(end).is_some_and(char::is_alphanumeric) {
                    end += 1;
                }
                let next: String = self.input[self.pos + 1..end].iter().collect();
                if matches!(Command::from_name(&next), Some(Command::OmitValue | Command::Value)) {
                    break;
                }
            }
            self.get_rest_of_line();
        }
    }

    fn overload(&mut self) {
        let name = Command::Overload.name();
        self.leave_para();
        self.private.metacommands_used.insert(name.to_string());
        let mut p1 = if self.is_blank_line() {
            String::new()
        } else {
            self.get_rest_of_line()
        };
        self.append(Atom::bare(AtomType::ParaLeft));
        if p1.is_empty() {
            self.append(Atom::new(AtomType::String, "This is an overloaded function."));
            self.append(Atom::bare(AtomType::ParaRight));
            p1 = self.get_meta_command_argument(name);
        } else {
            self.append(Atom::new(AtomType::String, "This function overloads "));
            self.append(Atom::new(AtomType::AutoLink, p1.as_str()));
            self.append(Atom::new(AtomType::String, "."));
            self.append(Atom::bare(AtomType::ParaRight));
        }
        self.private
            .meta_command_map
            .entry(name.to_string())
            .or_default()
            .push((p1, String::new()));
    }

    fn process_compares_with(&mut self) {
        let mut block = self.private.text.split_at_first(AtomType::ComparesLeft);
        let Some(first) = block.get_mut(0) else {
            return;
        };

        let mut args = split_compares_args(first.string());
        let category_name = if args.is_empty() {
            String::new()
        } else {
            args.remove(0)
        };
        let Some(category) = ComparisonCategory::from_name(&category_name) else {
            self.warn_with(
                format!("Invalid argument to \\compareswith command: `{}`", category_name),
                "Valid arguments are `strong`, `weak`, `partial`, or `equality`.",
            );
            return;
        };
        if args.is_empty() {
            self.warn_with(
                "Missing argument to \\compareswith command.",
                "Provide at least one type name, or a list of types separated by spaces.",
            );
            return;
        }

        let mut types: Vec<String> = Vec::new();
        for arg in args {
            if !types.contains(&arg) {
                types.push(arg);
            }
        }
        let joined = types.join(";");
        first.set_string(joined.as_str());

        let name = Command::ComparesWith.name();
        self.private
            .meta_command_map
            .entry(name.to_string())
            .or_default()
            .push((category.name().to_string(), joined));
        self.private.metacommands_used.insert(name.to_string());
        self.private.compares_with.entry(category).or_default().push(block);
    }

    fn parse_also(&mut self) {
        self.leave_para();
        self.skip_spaces_on_line();
        while self.pos < self.input.len() && self.input[self.pos] != '\n' {
            let before = self.pos;
            let target;
            let link_text;
            let mut skip = false;
            if self.input[self.pos] == '{' {
                let mut t = self.get_argument(ArgMode::Normal);
                self.skip_spaces_on_line();
                if self.ch(self.pos) == Some('{') {
                    link_text = self.get_argument(ArgMode::Normal);
                    // {QString::}{count()} names QString::count()
                    if t.ends_with("::") {
                        t.push_str(&link_text);
                    }
                } else {
                    link_text = t.clone();
                }
                target = t;
            } else {
                target = self.get_argument(ArgMode::Normal);
                link_text = clean_link(&target);
                skip = target == "and" || target == ".";
            }

            if !skip && !target.is_empty() {
                let mut also = Text::new();
                also.push(Atom::link(target, ""))
                    .push(Atom::new(AtomType::FormattingLeft, FORMATTING_LINK))
                    .push_str(&link_text)
                    .push(Atom::new(AtomType::FormattingRight, FORMATTING_LINK));
                self.private.add_also(also);
            }

            self.skip_spaces_on_line();
            self.skip_line_comment();
            if self.ch(self.pos) == Some(',') {
                self.pos += 1;
                self.skip_line_comment();
                self.skip_spaces_or_one_endl();
            } else if self.ch(self.pos).is_some_and(|c| c != '\n') {
                self.warn(format!("Missing comma in '\\{}'", Command::Sa.name()));
            }
            if self.pos == before {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        self.skip_spaces_on_line();
        let at = self.pos;
        if self.ch(at) == Some('/') && self.ch(at + 1) == Some('/') && self.ch(at + 2) == Some('!') {
            while self.ch(self.pos).is_some_and(|c| c != '\n') {
                self.pos += 1;
            }
        }
    }

    fn insert_anchor(&mut self, keyword: bool, name: String) {
        let (what, atom_type) = if keyword {
            ("keyword", AtomType::Keyword)
        } else {
            ("target", AtomType::Target)
        };
        if name.is_empty() {
            self.warn(format!("Expected an argument for \\{}", what));
            return;
        }

        let location = self.location();
        if let Some(previous) = self.target_map.get(&name) {
            let message = format!(
                "Duplicate {} name '{}'. The previous occurrence is here: {}",
                what, name, previous
            );
            self.sink.report(Diagnostic::warning(message).at_location(&location));
            return;
        }

        self.target_map.insert(name.clone(), location.clone());
        self.append(Atom::new(atom_type, name.as_str()));
        let anchor = AnchorDef {
            name,
            atom: self.private.text.len() - 1,
            location,
        };
        if keyword {
            self.private.keywords.push(anchor);
        } else {
            self.private.targets.push(anchor);
        }
    }

    fn include(&mut self, file: &str, identifier: &str, params: &[String]) -> ScribeResult<()> {
        let location = self.location();
        if self.locations.depth() > MAX_INCLUDE_DEPTH {
            return Err(ScribeError::fatal(
                location,
                format!("Too many nested '\\{}'s", Command::Include.name()),
            ));
        }

        let parser = self.parser;
        let Some(path) = parser.includes.resolve(file) else {
            self.warn(format!("Cannot find qdoc include file '{}'", file));
            return Ok(());
        };
        let shown = path.display().to_string();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => {
                self.warn(format!("Cannot open qdoc include file '{}'", shown));
                return Ok(());
            }
        };

        let included = if identifier.is_empty() {
            content
        } else {
            let lines: Vec<&str> = content.split('\n').collect();
            let opening = lines
                .iter()
                .position(|line| is_snippet_marker(line, identifier))
                .filter(|&i| i + 1 < lines.len());
            let Some(opening) = opening else {
                self.warn(format!("Cannot find '{}' in '{}'", identifier, shown));
                return Ok(());
            };
            let mut snippet = String::new();
            for line in lines[opening + 1..]
                .iter()
                .take_while(|line| !is_snippet_marker(line, identifier))
            {
                snippet.push_str(line);
                snippet.push('\n');
            }
            snippet
        };

        let included = expand_arguments(&included, params);
        if included.is_empty() {
            if !identifier.is_empty() {
                self.warn(format!("Empty qdoc snippet '{}' in '{}'", identifier, shown));
            }
            return Ok(());
        }

        tracing::debug!(file = %shown, depth = self.locations.depth(), "including file");
        let length = included.chars().count();
        self.locations.push(file);
        self.input.splice(self.pos..self.pos, included.chars());
        self.shift_opened_inputs(self.pos, length as isize);
        self.opened_inputs.push(self.pos + length);
        Ok(())
    }

    fn quote_from_file(&mut self, name: &str) {
        self.quoter.reset();
        let parser = self.parser;
        match parser.examples.resolve(name) {
            Some(path) => {
                let shown = path.display().to_string();
                match std::fs::read_to_string(&path) {
                    Ok(code) => {
                        let code = untabify(&code, self.tab_size());
                        self.quoter.quote_from_file(&shown, &code);
                    }
                    Err(_) => {
                        self.warn(format!("Cannot open file to quote from: '{}'", shown));
                        self.quoter.quote_from_file(&shown, "");
                    }
                }
            }
            None => {
                let searched: Vec<String> = parser
                    .examples
                    .search_directories()
                    .iter()
                    .map(|dir| dir.display().to_string())
                    .collect();
                self.warn_with(
                    format!("Cannot find file to quote from: {}", name),
                    format!("Searched directories: {}", searched.join(" ")),
                );
                self.quoter.quote_from_file(name, "");
            }
        }
    }

    fn quote_atoms(&mut self, cmd: Command, arg: &str) {
        if self.quoting() {
            self.append(Atom::new(AtomType::CodeQuoteCommand, cmd.name()));
            self.append(Atom::new(AtomType::CodeQuoteArgument, arg));
        }
    }

    fn get_code(&mut self, cmd: Command, arg_str: &str) -> String {
        let raw = self.get_until_end(cmd);
        let code = untabify(&raw, self.tab_size());
        let args: Vec<String> = arg_str.split_whitespace().map(str::to_string).collect();
        let code = expand_arguments(&code, &args);
        dedent(indent_level(&code), &code)
    }

    fn get_sectioning_unit(&mut self) -> u8 {
        let name = self.get_optional_argument();
        match name.as_str() {
            "section1" => 1,
            "section2" => 2,
            "section3" => 3,
            "section4" => 4,
            "" => 0,
            _ => {
                self.warn(format!("Invalid section '{}'", name));
                0
            }
        }
    }

    fn skip_to_next_preprocessor(&mut self) {
        let mut i = self.pos + 1;
        while i < self.input.len() {
            if self.input[i] != '\\' {
                i += 1;
                continue;
            }
            let mut end = i + 1;
            while self.ch(end).is_some_and(|c| c.is_alphanumeric() || c == '_') {
                end += 1;
            }
            let name: String = self.input[i + 1..end].iter().collect();
            if matches!(name.as_str(), "if" | "else" | "endif") {
                self.pos = i;
                return;
            }
            i = end;
        }
        self.pos = self.input.len();
    }

    // ----- arguments -----

    fn get_argument(&mut self, mode: ArgMode) -> String {
        self.skip_spaces_or_one_endl();
        let start = self.pos;
        let mut arg = self.get_braced_argument(mode);
        if arg.is_empty() {
            let mut depth = 0i32;
            while let Some(c) = self.ch(self.pos) {
                if (depth == 0 && c.is_whitespace()) || depth < 0 {
                    break;
                }
                match c {
                    '(' | '[' | '{' => {
                        depth += 1;
                        arg.push(c);
                        self.pos += 1;
                    }
                    ')' | ']' | '}' => {
                        depth -= 1;
                        if self.pos == start || depth >= 0 {
                            arg.push(c);
                            self.pos += 1;
                        }
                    }
                    '\\' => {
                        if !self.expand_macro(mode) {
                            if let Some(c) = self.ch(self.pos) {
                                arg.push(c);
                                self.pos += 1;
                            }
                        }
                    }
                    _ => {
                        arg.push(c);
                        self.pos += 1;
                    }
                }
            }
            self.end_pos = self.pos;

            // trailing punctuation belongs to the sentence
            if arg.chars().count() > 1
                && arg.chars().last().is_some_and(|c| ".,:;!?".contains(c))
                && !arg.ends_with("...")
            {
                arg.pop();
                self.pos -= 1;
            }
            if arg.chars().count() > 2 && arg.ends_with("'s") {
                arg.pop();
                arg.pop();
                self.pos -= 2;
            }
        }
        simplified(&arg)
    }

    fn get_braced_argument(&mut self, mode: ArgMode) -> String {
        let mut arg = String::new();
        if self.ch(self.pos) == Some('{') {
            self.pos += 1;
            let mut depth = 0i32;
            let mut closed = false;
            while let Some(c) = self.ch(self.pos) {
                match c {
                    '{' => {
                        depth += 1;
                        arg.push(c);
                        self.pos += 1;
                    }
                    '}' => {
                        depth -= 1;
                        self.pos += 1;
                        if depth < 0 {
                            closed = true;
                            break;
                        }
                        arg.push(c);
                    }
                    '\\' => {
                        if !self.expand_macro(mode) {
                            if let Some(c) = self.ch(self.pos) {
                                arg.push(c);
                                self.pos += 1;
                            }
                        }
                    }
                    _ => {
                        if c.is_whitespace() && mode != ArgMode::Verbatim {
                            arg.push(' ');
                        } else {
                            arg.push(c);
                        }
                        self.pos += 1;
                    }
                }
            }
            if !closed {
                self.warn("Missing '}'");
            }
        }
        self.end_pos = self.pos;
        arg
    }

    fn get_bracketed_argument(&mut self) -> String {
        self.skip_spaces_or_one_endl();
        let mut arg = String::new();
        if self.ch(self.pos) == Some('[') {
            self.pos += 1;
            let mut depth = 0i32;
            let mut closed = false;
            while let Some(c) = self.ch(self.pos) {
                self.pos += 1;
                match c {
                    '[' => {
                        depth += 1;
                        arg.push(c);
                    }
                    ']' => {
                        depth -= 1;
                        if depth < 0 {
                            closed = true;
                            break;
                        }
                        arg.push(c);
                    }
                    _ => arg.push(c),
                }
            }
            if !closed {
                self.warn("Missing ']'");
            }
        }
        arg
    }

    fn optional_bracketed_argument(&mut self) -> String {
        if self.is_left_bracket_ahead() {
            self.get_bracketed_argument()
        } else {
            String::new()
        }
    }

    /// An argument, unless the next thing is another command
    fn get_optional_argument(&mut self) -> String {
        self.skip_spaces_or_one_endl();
        if self.ch(self.pos) == Some('\\') && self.ch(self.pos + 1).is_some_and(char::is_alphanumeric) {
            String::new()
        } else {
            self.get_argument(ArgMode::Normal)
        }
    }

    /// The rest of the current line. A line ending in an odd number of
    /// backslashes continues on the next one; continued lines are joined
    /// with a space and the result is simplified.
    fn get_rest_of_line(&mut self) -> String {
        self.skip_spaces_on_line();
        let mut rest = String::new();
        let mut continued = false;
        loop {
            let start = self.pos;
            while self.ch(self.pos).is_some_and(|c| c != '\n') {
                self.pos += 1;
            }
            let mut line: String = self.input[start..self.pos].iter().collect();
            if self.pos < self.input.len() {
                self.pos += 1;
            }

            let trimmed = line.trim_end();
            let backslashes = trimmed.chars().rev().take_while(|&c| c == '\\').count();
            let continues = backslashes % 2 == 1;
            if continues {
                line = trimmed[..trimmed.len() - 1].to_string();
                continued = true;
            }
            if !rest.is_empty() {
                rest.push(' ');
            }
            rest.push_str(&line);
            if !continues || self.pos >= self.input.len() {
                break;
            }
        }
        if continued {
            simplified(&rest)
        } else {
            rest
        }
    }

    /// The argument of a meta-command: the rest of the line, extended over
    /// following lines while parentheses are open
    fn get_meta_command_argument(&mut self, command: &str) -> String {
        self.skip_spaces_on_line();
        let begin = self.pos;
        let mut depth = 0i32;
        while let Some(c) = self.ch(self.pos) {
            if c == '\n' && depth <= 0 {
                break;
            }
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                '\\' if self.expand_macro(ArgMode::Normal) => continue,
                _ => {}
            }
            self.pos = (self.pos + 1).min(self.input.len());
        }
        if self.pos >= self.input.len() && depth > 0 {
            self.pos = begin;
            self.warn(format!("Unbalanced parentheses in '{}'", command));
        }
        let arg = simplified(&self.input[begin..self.pos].iter().collect::<String>());
        self.skip_spaces_on_line();
        arg
    }

    /// Everything up to the end command matching `cmd`, which is consumed
    fn get_until_end(&mut self, cmd: Command) -> String {
        let end = cmd.end_command();
        let needle: Vec<char> = format!("\\{}", end.name()).chars().collect();
        let mut i = self.pos;
        while i + needle.len() <= self.input.len() {
            let after = self.ch(i + needle.len());
            if self.input[i..i + needle.len()] == needle[..]
                && !after.is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                let text = self.input[self.pos..i].iter().collect();
                self.pos = i + needle.len();
                return text;
            }
            i += 1;
        }
        self.warn(format!("Missing '\\{}'", end.name()));
        self.pos = self.input.len();
        String::new()
    }

    // ----- whitespace -----

    fn is_blank_line(&self) -> bool {
        let mut i = self.pos;
        while let Some(c) = self.ch(i).filter(|c| c.is_whitespace()) {
            if c == '\n' {
                return true;
            }
            i += 1;
        }
        false
    }

    fn is_ahead(&self, wanted: char) -> bool {
        let mut newlines = 0;
        let mut i = self.pos;
        while let Some(c) = self.ch(i).filter(|c| c.is_whitespace()) {
            if newlines >= 2 {
                break;
            }
            if c == '\n' {
                newlines += 1;
            }
            i += 1;
        }
        newlines < 2 && self.ch(i) == Some(wanted)
    }

    fn is_left_brace_ahead(&self) -> bool {
        self.is_ahead('{')
    }

    fn is_left_bracket_ahead(&self) -> bool {
        self.is_ahead('[')
    }

    fn skip_spaces_on_line(&mut self) {
        while self.ch(self.pos).is_some_and(|c| c.is_whitespace() && c != '\n') {
            self.pos += 1;
        }
    }

    fn skip_spaces_or_one_endl(&mut self) {
        let mut first_endl = None;
        while let Some(c) = self.ch(self.pos).filter(|c| c.is_whitespace()) {
            if c == '\n' {
                match first_endl {
                    None => first_endl = Some(self.pos),
                    Some(first) => {
                        self.pos = first;
                        return;
                    }
                }
            }
            self.pos += 1;
        }
    }

    fn skip_all_spaces(&mut self) {
        while self.ch(self.pos).is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    // ----- paragraphs and blocks -----

    fn enter_para(&mut self) {
        self.enter_para_with(AtomType::ParaLeft, AtomType::ParaRight, "");
    }

    fn enter_block_para(&mut self, left: AtomType, right: AtomType) {
        self.leave_para();
        self.enter_para_with(left, right, "");
    }

    fn enter_para_with(&mut self, left: AtomType, right: AtomType, string: &str) {
        if self.paragraph != Paragraph::Outside {
            return;
        }
        if !matches!(
            self.private.text.last_type(),
            AtomType::ListItemLeft | AtomType::DivLeft | AtomType::DetailsLeft
        ) {
            self.leave_value_list();
        }
        self.append(Atom::new(left, string));
        self.index_started_paragraph = false;
        self.pending_left = left;
        self.pending_right = right;
        self.pending_string = string.to_string();
        self.paragraph = if left == AtomType::SectionHeadingLeft {
            Paragraph::SingleLine
        } else {
            Paragraph::MultiLine
        };
        self.skip_spaces_or_one_endl();
    }

    fn leave_para(&mut self) {
        if self.paragraph == Paragraph::Outside {
            return;
        }
        if !self.pending_formats.is_empty() {
            self.warn("Missing '}'");
            self.pending_formats.clear();
        }

        if self.private.text.last_type() == self.pending_left {
            self.private.text.strip_last();
        } else {
            if let Some(last) = self.private.text.last_atom_mut() {
                if last.atom_type() == AtomType::String && last.string().ends_with(' ') {
                    last.chop();
                }
            }
            let right = Atom::new(self.pending_right, self.pending_string.as_str());
            self.append(right);
        }
        self.paragraph = Paragraph::Outside;
        self.index_started_paragraph = false;
        self.pending_right = AtomType::Nop;
        self.pending_string.clear();
    }

    fn leave_value(&mut self) {
        self.leave_para();
        if self.opened_lists.is_empty() {
            self.opened_lists.push(OpenedList::new(ListStyle::Value));
            self.append(Atom::new(AtomType::ListLeft, LIST_VALUE));
        } else {
            if self.private.text.last_type() == AtomType::Nop {
                self.private.text.strip_last();
            }
            self.append(Atom::new(AtomType::ListItemRight, LIST_VALUE));
        }
    }

    fn leave_value_list(&mut self) {
        self.leave_para();
        if self.opened_lists.last().map(OpenedList::style) == Some(ListStyle::Value) {
            if self.private.text.last_type() == AtomType::Nop {
                self.private.text.strip_last();
            }
            self.append(Atom::new(AtomType::ListItemRight, LIST_VALUE));
            self.append(Atom::new(AtomType::ListRight, LIST_VALUE));
            self.opened_lists.pop();
        }
    }

    fn leave_table_row(&mut self) {
        if self.in_table_item {
            self.leave_para();
            self.append(Atom::bare(AtomType::TableItemRight));
            self.in_table_item = false;
        }
        if self.in_table_header {
            self.append(Atom::bare(AtomType::TableHeaderRight));
            self.in_table_header = false;
        }
        if self.in_table_row {
            self.append(Atom::bare(AtomType::TableRowRight));
            self.in_table_row = false;
        }
    }

    fn top_command(&self) -> Command {
        self.opened_commands.last().copied().unwrap_or(Command::Omit)
    }

    fn open_command(&mut self, cmd: Command) -> bool {
        let outer = self.top_command();
        if cmd == Command::ComparesWith && self.opened_commands.contains(&cmd) {
            self.warn(format!("Cannot nest '\\{}' commands", cmd.name()));
            return false;
        }
        if cmd.may_open_inside(outer) {
            self.opened_commands.push(cmd);
            true
        } else {
            self.warn(format!("Can't use '\\{}' in '\\{}'", cmd.name(), outer.name()));
            false
        }
    }

    /// Close the innermost block ended by `end`. Blocks left open inside
    /// it are reported and dropped, but the block itself then stays open.
    fn close_command(&mut self, end: Command) -> bool {
        if self.top_command().end_command() == end && self.opened_commands.len() > 1 {
            self.opened_commands.pop();
            return true;
        }

        let open_somewhere = self
            .opened_commands
            .iter()
            .skip(1)
            .any(|c| c.end_command() == end);
        if open_somewhere {
            while self.top_command().end_command() != end && self.opened_commands.len() > 1 {
                let missing = self.top_command().end_command();
                self.warn(format!("Missing '\\{}' before '\\{}'", missing.name(), end.name()));
                self.opened_commands.pop();
            }
        } else {
            self.warn(format!("Unexpected '\\{}'", end.name()));
        }
        false
    }

    fn start_format(&mut self, format: &str, cmd: Command) {
        self.enter_para();
        if self.pending_formats.values().any(|f| f == format) {
            self.warn(format!("Cannot nest '\\{}' commands", cmd.name()));
            return;
        }

        self.append(Atom::new(AtomType::FormattingLeft, format));
        if self.is_left_brace_ahead() {
            self.skip_spaces_or_one_endl();
            self.pending_formats.insert(self.brace_depth, format.to_string());
            self.brace_depth += 1;
            self.pos += 1;
        } else {
            let arg = self.get_argument(ArgMode::Normal);
            self.append(Atom::new(AtomType::String, arg));
            self.append(Atom::new(AtomType::FormattingRight, format));
            if format == FORMATTING_INDEX && self.index_started_paragraph {
                self.skip_all_spaces();
                self.index_started_paragraph = false;
            }
        }
    }

    fn start_section(&mut self, level: u8) {
        self.leave_value_list();
        if self.current_section != 0 {
            self.end_section();
        }
        self.append(Atom::new(AtomType::SectionLeft, level.to_string()));
        self.private.toc.push(self.private.text.len() - 1);
        self.private.toc_levels.push(level);
        self.enter_para_with(
            AtomType::SectionHeadingLeft,
            AtomType::SectionHeadingRight,
            &level.to_string(),
        );
        self.current_section = level;
    }

    fn end_section(&mut self) {
        self.leave_para();
        let level = self.current_section.to_string();
        self.append(Atom::new(AtomType::SectionRight, level));
        self.current_section = 0;
    }

    // ----- output -----

    fn append(&mut self, atom: Atom) {
        self.private.text.push(atom);
    }

    /// Append to the current string atom; a space is never doubled
    fn append_char(&mut self, ch: char) {
        if self.private.text.last_type() != AtomType::String {
            self.append(Atom::bare(AtomType::String));
        }
        if let Some(atom) = self.private.text.last_atom_mut() {
            if ch != ' ' || !atom.string().ends_with(' ') {
                atom.append_char(ch);
            }
        }
    }

    fn append_word(&mut self, word: &str) {
        match self.private.text.last_atom_mut() {
            Some(atom) if atom.atom_type() == AtomType::String => atom.append_str(word),
            _ => self.append(Atom::new(AtomType::String, word)),
        }
    }

    fn append_to_code(&mut self, code: &str) {
        self.append_to_code_as(code, AtomType::Code);
    }

    /// Extend the code atom preceding the current command, or start one
    fn append_to_code_as(&mut self, code: &str, default_type: AtomType) {
        let extends = self
            .last_atom
            .and_then(|i| self.private.text.get(i))
            .is_some_and(|a| is_code(a.atom_type()));
        if !extends {
            self.append(Atom::bare(default_type));
            self.last_atom = self.private.text.last_index();
        }
        if let Some(atom) = self.last_atom.and_then(|i| self.private.text.get_mut(i)) {
            atom.append_str(code);
        }
    }

    // ----- reporting -----

    /// Current location, following `\include`d text
    fn location(&mut self) -> Location {
        // text included at the very end of an inclusion is nested in it
        while let Some(&end) = self.opened_inputs.last() {
            if end >= self.pos {
                break;
            }
            self.opened_inputs.pop();
            self.locations.pop();
            self.cached_pos = end;
        }
        let tab_size = self.tab_size();
        while self.cached_pos < self.pos && self.cached_pos < self.input.len() {
            self.locations.advance(self.input[self.cached_pos], tab_size);
            self.cached_pos += 1;
        }
        self.locations.top().clone()
    }

    fn warn(&mut self, message: impl Into<String>) {
        let location = self.location();
        self.sink.report(Diagnostic::warning(message).at_location(&location));
    }

    fn warn_with(&mut self, message: impl Into<String>, details: impl Into<String>) {
        let location = self.location();
        self.sink.report(
            Diagnostic::warning(message)
                .at_location(&location)
                .with_details(details),
        );
    }

    fn quoting(&self) -> bool {
        self.parser.config.quoting_information
    }

    fn tab_size(&self) -> usize {
        self.parser.config.tab_size
    }
}

fn is_snippet_marker(line: &str, identifier: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("//!") && trimmed.contains(identifier)
}

fn is_code(atom_type: AtomType) -> bool {
    matches!(atom_type, AtomType::Code | AtomType::Qml)
}

fn is_quote(atom_type: AtomType) -> bool {
    matches!(
        atom_type,
        AtomType::CodeQuoteArgument
            | AtomType::CodeQuoteCommand
            | AtomType::SnippetCommand
            | AtomType::SnippetIdentifier
            | AtomType::SnippetLocation
    )
}

/// Advance `cur` over a word and tell whether it looks like an API name.
///
/// A word qualifies with an uppercase letter after its first character
/// and two lowercase letters (`QString`, `fOo`), or with any of `_`, `@`,
/// `::` or a trailing `()` next to at least one letter.
fn scan_auto_link(chars: &[char], cur: &mut usize) -> bool {
    let start = *cur;
    let mut lower = 0;
    let mut upper = 0;
    let mut strange = 0;
    while let Some(&c) = chars.get(*cur) {
        match c {
            'a'..='z' => {
                lower += 1;
                *cur += 1;
            }
            'A'..='Z' => {
                if *cur > start {
                    upper += 1;
                }
                *cur += 1;
            }
            '0'..='9' if *cur > start => *cur += 1,
            '_' | '@' => {
                strange += 1;
                *cur += 1;
            }
            ':' if chars.get(*cur + 1) == Some(&':') => {
                strange += 1;
                *cur += 2;
            }
            '(' if chars.get(*cur + 1) == Some(&')') => {
                strange += 1;
                *cur += 2;
                break;
            }
            _ => break,
        }
    }
    (upper >= 1 && lower >= 2) || (strange > 0 && upper + lower >= 1)
}

/// Whether the whole of `word` is an API name
pub fn is_auto_link_string(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    let mut cur = 0;
    scan_auto_link(&chars, &mut cur) && cur == chars.len()
}

/// Link text shown for a bare `\l` target
fn clean_link(link: &str) -> String {
    for prefix in ["file:", "mailto:"] {
        if let Some(rest) = link.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    link.to_string()
}

fn parse_unicode(arg: &str) -> Option<char> {
    let value = if let Some(hex) = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if arg.len() > 1 && arg.starts_with('0') {
        u32::from_str_radix(&arg[1..], 8).ok()?
    } else {
        arg.parse::<u32>().ok()?
    };
    if value == 0 || value > 0xFFFE {
        return None;
    }
    char::from_u32(value)
}

/// Arguments of `\compareswith`: words, or `{...}` groups with the braces
/// removed
fn split_compares_args(arg: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut flush = |current: &mut String, args: &mut Vec<String>| {
        let word = simplified(current);
        if !word.is_empty() {
            args.push(word);
        }
        current.clear();
    };
    for c in arg.chars() {
        match c {
            '{' => {
                if depth == 0 {
                    flush(&mut current, &mut args);
                } else {
                    current.push(c);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    flush(&mut current, &mut args);
                } else {
                    current.push(c);
                }
            }
            c if c.is_whitespace() && depth == 0 => flush(&mut current, &mut args),
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut args);
    args
}

/// Expand tabs, strip trailing spaces from every line, and trim leading
/// and trailing blank lines down to at most one final newline
fn untabify(text: &str, tab_size: usize) -> String {
    let tab = tab_size.max(1);
    let mut out = String::with_capacity(text.len());
    let mut column = 0;
    for ch in text.chars() {
        match ch {
            '\t' => {
                let advance = tab - column % tab;
                out.extend(std::iter::repeat(' ').take(advance));
                column += advance;
            }
            '\n' => {
                while out.ends_with(' ') {
                    out.pop();
                }
                out.push('\n');
                column = 0;
            }
            _ => {
                out.push(ch);
                column += 1;
            }
        }
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out.trim_start_matches('\n').to_string()
}

/// Smallest indentation of a non-blank line
fn indent_level(code: &str) -> usize {
    let mut min_indent = usize::MAX;
    let mut column = 0;
    for ch in code.chars() {
        if ch == '\n' {
            column = 0;
        } else {
            if ch != ' ' && column < min_indent {
                min_indent = column;
            }
            column += 1;
        }
    }
    min_indent
}

fn dedent(level: usize, code: &str) -> String {
    if level == 0 {
        return code.to_string();
    }
    let mut out = String::with_capacity(code.len());
    let mut column = 0;
    for ch in code.chars() {
        if ch == '\n' {
            out.push('\n');
            column = 0;
        } else {
            if column >= level {
                out.push(ch);
            }
            column += 1;
        }
    }
    out
}

/// Replace `\1`..`\9` with the matching argument
fn expand_arguments(text: &str, args: &[String]) -> String {
    if args.is_empty() {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            let param = chars
                .get(i + 1)
                .and_then(|c| c.to_digit(10))
                .map(|d| d as usize)
                .filter(|&n| n >= 1 && n <= args.len());
            if let Some(n) = param {
                out.push_str(&args[n - 1]);
                i += 2;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}
