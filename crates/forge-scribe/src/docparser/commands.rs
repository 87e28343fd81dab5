//! The built-in markup commands

/// A built-in command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    A,
    AnnotatedList,
    B,
    BadCode,
    Bold,
    Br,
    Brief,
    C,
    Caption,
    Code,
    CodeLine,
    ComparesWith,
    Details,
    Div,
    Dots,
    E,
    Else,
    EndCode,
    EndComparesWith,
    EndDetails,
    EndDiv,
    EndFootnote,
    EndIf,
    EndLegalese,
    EndLink,
    EndList,
    EndMapRef,
    EndOmit,
    EndQuotation,
    EndRaw,
    EndSection1,
    EndSection2,
    EndSection3,
    EndSection4,
    EndSidebar,
    EndTable,
    Footnote,
    GenerateList,
    Header,
    Hr,
    I,
    If,
    Image,
    Important,
    Include,
    InlineImage,
    Index,
    Input,
    Keyword,
    L,
    Legalese,
    Li,
    Link,
    List,
    Meta,
    Note,
    O,
    Omit,
    OmitValue,
    Overload,
    PrintLine,
    PrintTo,
    PrintUntil,
    Quotation,
    QuoteFile,
    QuoteFromFile,
    Raw,
    Row,
    Sa,
    Section1,
    Section2,
    Section3,
    Section4,
    Sidebar,
    SinceList,
    SkipLine,
    SkipTo,
    SkipUntil,
    Snippet,
    Span,
    Sub,
    Sup,
    Table,
    TableOfContents,
    Target,
    Tm,
    Tt,
    UiControl,
    Underline,
    Unicode,
    Value,
    Warning,
    Qml,
    EndQml,
    Cpp,
    EndCpp,
    CppText,
    EndCppText,
}

use Command::*;

/// Every command with its name, in table order
const COMMANDS: &[(&str, Command)] = &[
    ("a", A),
    ("annotatedlist", AnnotatedList),
    ("b", B),
    ("badcode", BadCode),
    ("bold", Bold),
    ("br", Br),
    ("brief", Brief),
    ("c", C),
    ("caption", Caption),
    ("code", Code),
    ("codeline", CodeLine),
    ("compareswith", ComparesWith),
    ("details", Details),
    ("div", Div),
    ("dots", Dots),
    ("e", E),
    ("else", Else),
    ("endcode", EndCode),
    ("endcompareswith", EndComparesWith),
    ("enddetails", EndDetails),
    ("enddiv", EndDiv),
    ("endfootnote", EndFootnote),
    ("endif", EndIf),
    ("endlegalese", EndLegalese),
    ("endlink", EndLink),
    ("endlist", EndList),
    ("endmapref", EndMapRef),
    ("endomit", EndOmit),
    ("endquotation", EndQuotation),
    ("endraw", EndRaw),
    ("endsection1", EndSection1),
    ("endsection2", EndSection2),
    ("endsection3", EndSection3),
    ("endsection4", EndSection4),
    ("endsidebar", EndSidebar),
    ("endtable", EndTable),
    ("footnote", Footnote),
    ("generatelist", GenerateList),
    ("header", Header),
    ("hr", Hr),
    ("i", I),
    ("if", If),
    ("image", Image),
    ("important", Important),
    ("include", Include),
    ("inlineimage", InlineImage),
    ("index", Index),
    ("input", Input),
    ("keyword", Keyword),
    ("l", L),
    ("legalese", Legalese),
    ("li", Li),
    ("link", Link),
    ("list", List),
    ("meta", Meta),
    ("note", Note),
    ("o", O),
    ("omit", Omit),
    ("omitvalue", OmitValue),
    ("overload", Overload),
    ("printline", PrintLine),
    ("printto", PrintTo),
    ("printuntil", PrintUntil),
    ("quotation", Quotation),
    ("quotefile", QuoteFile),
    ("quotefromfile", QuoteFromFile),
    ("raw", Raw),
    ("row", Row),
    ("sa", Sa),
    ("section1", Section1),
    ("section2", Section2),
    ("section3", Section3),
    ("section4", Section4),
    ("sidebar", Sidebar),
    ("sincelist", SinceList),
    ("skipline", SkipLine),
    ("skipto", SkipTo),
    ("skipuntil", SkipUntil),
    ("snippet", Snippet),
    ("span", Span),
    ("sub", Sub),
    ("sup", Sup),
    ("table", Table),
    ("tableofcontents", TableOfContents),
    ("target", Target),
    ("tm", Tm),
    ("tt", Tt),
    ("uicontrol", UiControl),
    ("underline", Underline),
    ("unicode", Unicode),
    ("value", Value),
    ("warning", Warning),
    ("qml", Qml),
    ("endqml", EndQml),
    ("cpp", Cpp),
    ("endcpp", EndCpp),
    ("cpptext", CppText),
    ("endcpptext", EndCppText),
];

impl Command {
    /// Look a command up by the name written after the backslash
    pub fn from_name(name: &str) -> Option<Command> {
        COMMANDS.iter().find(|(n, _)| *n == name).map(|&(_, c)| c)
    }

    pub fn name(self) -> &'static str {
        COMMANDS
            .iter()
            .find(|(_, c)| *c == self)
            .map(|&(n, _)| n)
            .unwrap_or_default()
    }

    /// All command names
    pub fn names() -> impl Iterator<Item = &'static str> {
        COMMANDS.iter().map(|&(n, _)| n)
    }

    /// Inline formatting commands; these survive inside macro arguments
    pub fn is_formatting(self) -> bool {
        matches!(self, A | B | Bold | C | E | I | Sub | Sup | Tm | Tt | UiControl | Underline)
    }

    /// The command that closes this one. Commands without a closing
    /// partner close themselves.
    pub fn end_command(self) -> Command {
        match self {
            BadCode | Code => EndCode,
            ComparesWith => EndComparesWith,
            Details => EndDetails,
            Div => EndDiv,
            Qml => EndQml,
            Footnote => EndFootnote,
            Legalese => EndLegalese,
            Link => EndLink,
            List => EndList,
            Omit => EndOmit,
            Quotation => EndQuotation,
            Raw => EndRaw,
            Section1 => EndSection1,
            Section2 => EndSection2,
            Section3 => EndSection3,
            Section4 => EndSection4,
            Sidebar => EndSidebar,
            Table => EndTable,
            other => other,
        }
    }

    /// Whether `self` may be opened while `outer` is the innermost open
    /// block. `\link` opens anywhere.
    pub fn may_open_inside(self, outer: Command) -> bool {
        if self == Link {
            return true;
        }
        match outer {
            List => matches!(self, Footnote | List),
            Sidebar => matches!(self, List | Quotation | Sidebar),
            Quotation => matches!(self, List),
            Table => matches!(self, List | Footnote | Quotation),
            Footnote | Link => false,
            _ => true,
        }
    }

    /// Section level of `\sectionN` and `\endsectionN`
    pub fn section_level(self) -> Option<u8> {
        match self {
            Section1 | EndSection1 => Some(1),
            Section2 | EndSection2 => Some(2),
            Section3 | EndSection3 => Some(3),
            Section4 | EndSection4 => Some(4),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(Command::from_name("endlist"), Some(EndList));
        assert_eq!(Command::from_name("nosuch"), None);
        for name in Command::names() {
            let cmd = Command::from_name(name).unwrap();
            assert_eq!(cmd.name(), name);
        }
        assert_eq!(Command::names().count(), 98);
    }

    #[test]
    fn test_end_command() {
        assert_eq!(BadCode.end_command(), EndCode);
        assert_eq!(Section3.end_command(), EndSection3);
        assert_eq!(Brief.end_command(), Brief);
    }

    #[test]
    fn test_nesting() {
        assert!(List.may_open_inside(Table));
        assert!(Footnote.may_open_inside(Table));
        assert!(!Table.may_open_inside(List));
        assert!(!List.may_open_inside(Footnote));
        assert!(Link.may_open_inside(Footnote));
        assert!(Table.may_open_inside(Omit));
    }
}
