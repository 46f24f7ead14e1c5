use memchr::memchr2_iter;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Interned label identifier. Identical label strings share one id.
pub type LabelId = i32;

/// A parsed ordered tree. Node payloads are interned label ids.
pub type ParsedTree = indextree::Arena<LabelId>;

/// Interns label strings to dense ids and counts label occurrences
/// across the whole collection.
#[derive(Debug, Default)]
pub struct LabelDict {
    ids: FxHashMap<String, (LabelId, usize)>,
}

impl LabelDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the id of `label`, interning it first if it is new, and
    /// bumps the occurrence count.
    pub fn get_or_insert(&mut self, label: &str) -> LabelId {
        let next_id = self.ids.len() as LabelId;
        let entry = self.ids.entry(label.to_owned()).or_insert((next_id, 0));
        entry.1 += 1;
        entry.0
    }

    /// Iterator over `(label id, occurrence count)` pairs.
    pub fn values(&self) -> impl Iterator<Item = &(LabelId, usize)> {
        self.ids.values()
    }

    /// Label strings indexed by their id.
    pub fn labels_by_id(&self) -> Vec<&str> {
        let mut labels = vec![""; self.ids.len()];
        for (label, (id, _)) in self.ids.iter() {
            labels[*id as usize] = label.as_str();
        }
        labels
    }
}

#[derive(Error, Debug)]
pub enum DatasetParseError {
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    ParseError(#[from] TreeParseError),
}

/// Parses a dataset file with one bracket notation tree per line.
pub fn parse_dataset(
    dataset_file: impl AsRef<Path>,
    label_dict: &mut LabelDict,
) -> Result<Vec<ParsedTree>, DatasetParseError> {
    let f = File::open(dataset_file.as_ref())?;
    let reader = BufReader::new(f);
    let trees = reader
        .lines()
        .map(|line| parse_tree(line, label_dict))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(trees)
}

const TOKEN_START: u8 = b'{';
const TOKEN_END: u8 = b'}';

#[derive(Error, Debug)]
pub enum TreeParseError {
    #[error("tree string contains non ascii characters")]
    IsNotAscii,
    #[error(transparent)]
    LineReadError(#[from] io::Error),
    #[error("tree string has incorrect bracket notation format: {}", .0)]
    IncorrectFormat(String),
}

/// Parses a single line of bracket notation, e.g. `{a{b}{c}}`. A label is
/// the character run between `{` and the next bracket; escaping is not
/// supported.
pub fn parse_tree(
    tree_str: Result<String, io::Error>,
    label_dict: &mut LabelDict,
) -> Result<ParsedTree, TreeParseError> {
    use TreeParseError as TPE;

    let tree_str = tree_str?;
    if !tree_str.is_ascii() {
        return Err(TPE::IsNotAscii);
    }
    let mut tree = ParsedTree::new();
    let tree_bytes = tree_str.as_bytes();

    let token_positions: Vec<usize> = memchr2_iter(TOKEN_START, TOKEN_END, tree_bytes).collect();

    if token_positions.len() < 2 {
        return Err(TPE::IncorrectFormat(
            "Minimal of 2 brackets not found!".to_owned(),
        ));
    }

    let mut tokens = token_positions.iter().peekable();
    let root_start = *tokens.next().unwrap();
    if tree_bytes[root_start] != TOKEN_START {
        return Err(TPE::IncorrectFormat(
            "Tree string must open with a bracket".to_owned(),
        ));
    }
    let root_end = **tokens.peek().unwrap();

    let root_label = &tree_str[(root_start + 1)..root_end];
    let root = tree.new_node(label_dict.get_or_insert(root_label));
    let mut node_stack = vec![root];

    while let Some(token) = tokens.next() {
        match tree_bytes[*token] {
            TOKEN_START => {
                let Some(token_end) = tokens.peek() else {
                    let err_msg =
                        format!("Label has no ending token near col {token}, line \"{tree_str}\"");
                    return Err(TPE::IncorrectFormat(err_msg));
                };
                let label = &tree_str[(*token + 1)..**token_end];
                let n = tree.new_node(label_dict.get_or_insert(label));
                let Some(last_node) = node_stack.last() else {
                    let err_msg = format!("Node has no parent to attach to on line \"{tree_str}\"");
                    return Err(TPE::IncorrectFormat(err_msg));
                };
                last_node.append(n, &mut tree);
                node_stack.push(n);
            }
            TOKEN_END => {
                let Some(_) = node_stack.pop() else {
                    return Err(TPE::IncorrectFormat("Wrong bracket pairing".to_owned()));
                };
            }
            _ => unreachable!("tokenizer yields brackets only"),
        }
    }

    if !node_stack.is_empty() {
        return Err(TPE::IncorrectFormat(
            "Unbalanced brackets, tree is left open".to_owned(),
        ));
    }

    Ok(tree)
}

/// Parses a single tree string, panicking on malformed input. Test helper.
pub fn parse_single(tree_str: impl Into<String>, label_dict: &mut LabelDict) -> ParsedTree {
    parse_tree(Ok(tree_str.into()), label_dict).expect("malformed tree string")
}

pub enum TreeOutput {
    BracketNotation,
    Graphviz,
}

/// Renders a parsed tree back to text, resolving interned labels through
/// the dictionary.
pub fn tree_to_string(tree: &ParsedTree, label_dict: &LabelDict, output: TreeOutput) -> String {
    let Some(root) = tree.iter().next() else {
        return String::new();
    };
    let root_id = tree.get_node_id(root).unwrap();
    let labels = label_dict.labels_by_id();

    match output {
        TreeOutput::BracketNotation => {
            let mut out = String::new();
            write_bracket(root_id, tree, &labels, &mut out);
            out
        }
        TreeOutput::Graphviz => {
            let numbering: FxHashMap<indextree::NodeId, usize> = root_id
                .descendants(tree)
                .enumerate()
                .map(|(i, nid)| (nid, i))
                .collect();
            let mut out = String::from("digraph {\n");
            for nid in root_id.descendants(tree) {
                let node = tree.get(nid).unwrap();
                out.push_str(&format!(
                    "  n{} [label=\"{}\"];\n",
                    numbering[&nid],
                    labels[*node.get() as usize]
                ));
                for cnid in nid.children(tree) {
                    out.push_str(&format!("  n{} -> n{};\n", numbering[&nid], numbering[&cnid]));
                }
            }
            out.push_str("}\n");
            out
        }
    }
}

fn write_bracket(nid: indextree::NodeId, tree: &ParsedTree, labels: &[&str], out: &mut String) {
    let label = tree.get(nid).unwrap().get();
    out.push('{');
    out.push_str(labels[*label as usize]);
    for cnid in nid.children(tree) {
        write_bracket(cnid, tree, labels, out);
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses() {
        let mut ld = LabelDict::new();
        let input = "{einsteinstrasse{1}{3}}".to_owned();
        let arena = parse_tree(Ok(input), &mut ld);
        assert!(arena.is_ok());
        let arena = arena.unwrap();
        assert_eq!(arena.count(), 3);
        assert_eq!(ld.len(), 3);
        let labels = ld.labels_by_id();
        let mut iter = arena.iter();
        assert_eq!(
            iter.next().map(|node| labels[*node.get() as usize]),
            Some("einsteinstrasse")
        );
        assert_eq!(
            iter.next().map(|node| labels[*node.get() as usize]),
            Some("1")
        );
        assert_eq!(
            iter.next().map(|node| labels[*node.get() as usize]),
            Some("3")
        );
    }

    #[test]
    fn test_interns_repeated_labels() {
        let mut ld = LabelDict::new();
        let t = parse_single("{a{b{a}}{a}}", &mut ld);
        assert_eq!(t.count(), 4);
        // two distinct labels, 'a' seen three times
        assert_eq!(ld.len(), 2);
        let a_count = ld.values().map(|(_, c)| *c).max().unwrap();
        assert_eq!(a_count, 3);
    }

    #[test]
    fn test_rejects_unbalanced() {
        let mut ld = LabelDict::new();
        assert!(parse_tree(Ok("{a{b}".to_owned()), &mut ld).is_err());
        assert!(parse_tree(Ok("a".to_owned()), &mut ld).is_err());
        assert!(parse_tree(Ok("}a{".to_owned()), &mut ld).is_err());
    }

    #[test]
    fn test_bracket_round_trip() {
        let mut ld = LabelDict::new();
        let input = "{article{key{x17}}{author{jian li}}{year{2008}}}";
        let tree = parse_single(input, &mut ld);
        assert_eq!(
            tree_to_string(&tree, &ld, TreeOutput::BracketNotation),
            input
        );
    }

    #[test]
    fn test_descendants_correct() {
        let mut ld = LabelDict::new();
        let input = "{first{second{third}{fourth{fifth{six}{seven}}}}}".to_owned();
        let arena = parse_tree(Ok(input), &mut ld);
        assert!(arena.is_ok());
        let arena = arena.unwrap();
        let labels = ld.labels_by_id();
        let Some(root) = arena.iter().next() else {
            panic!("Unable to get root but tree is not empty!");
        };
        let root_id = arena.get_node_id(root).unwrap();
        let visited: Vec<&str> = root_id
            .descendants(&arena)
            .map(|nid| labels[*arena.get(nid).unwrap().get() as usize])
            .collect();
        assert_eq!(
            visited,
            vec!["first", "second", "third", "fourth", "fifth", "six", "seven"]
        );
    }
}
