//! Source file writers for integration tests

use std::path::{Path, PathBuf};

/// A well-formed three-word sentence block
///
/// Every block shares the `noun_nom_sing_fem` pattern on its first token.
pub fn conllu_sentence(sent_id: &str) -> String {
    format!(
        "# sent_id = {sent_id}\n\
         # text = Мама мыла раму.\n\
         1\tМама\tмама\tNOUN\t_\tAnimacy=Anim|Case=Nom|Gender=Fem|Number=Sing\t2\tnsubj\t_\t_\n\
         2\tмыла\tмыть\tVERB\t_\tAspect=Imp|Gender=Fem|Mood=Ind|Number=Sing|Tense=Past|VerbForm=Fin|Voice=Act\t0\troot\t_\t_\n\
         3\tраму\tрама\tNOUN\t_\tAnimacy=Inan|Case=Acc|Gender=Fem|Number=Sing\t2\tobj\t_\tSpaceAfter=No\n\
         4\t.\t.\tPUNCT\t_\t_\t2\tpunct\t_\t_\n\n"
    )
}

/// A block whose second token line has three fields instead of ten
pub fn malformed_sentence(sent_id: &str) -> String {
    format!(
        "# sent_id = {sent_id}\n\
         # text = Кот спит.\n\
         1\tКот\tкот\tNOUN\t_\tCase=Nom|Gender=Masc|Number=Sing\t2\tnsubj\t_\t_\n\
         2\tспит\tспать\n\n"
    )
}

/// Write sentence blocks to `<dir>/<name>`
pub fn write_conllu(dir: &Path, name: &str, blocks: &[String]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, blocks.concat()).unwrap();
    path
}

/// Write a Tatoeba export: `(id, lang, text)` rows and `(source, target)` links
pub fn write_tatoeba(
    dir: &Path,
    sentences: &[(u64, &str, &str)],
    links: &[(u64, u64)],
) -> (PathBuf, PathBuf) {
    let sentences_path = dir.join("sentences.csv");
    let links_path = dir.join("links.csv");

    let sentence_rows: String = sentences
        .iter()
        .map(|(id, lang, text)| format!("{id}\t{lang}\t{text}\n"))
        .collect();
    let link_rows: String = links
        .iter()
        .map(|(source, target)| format!("{source}\t{target}\n"))
        .collect();

    std::fs::write(&sentences_path, sentence_rows).unwrap();
    std::fs::write(&links_path, link_rows).unwrap();
    (sentences_path, links_path)
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Write a MediaWiki export with one page per `(title, wikitext)`
pub fn write_dump(dir: &Path, pages: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("dump.xml");

    let mut xml = String::from(
        "<mediawiki xmlns=\"http://www.mediawiki.org/xml/export-0.10/\">\n  <siteinfo>\n    <sitename>Wiktionary</sitename>\n  </siteinfo>\n",
    );
    for (title, text) in pages {
        xml.push_str(&format!(
            "  <page>\n    <title>{}</title>\n    <ns>0</ns>\n    <revision>\n      <text xml:space=\"preserve\">{}</text>\n    </revision>\n  </page>\n",
            escape_xml(title),
            escape_xml(text)
        ));
    }
    xml.push_str("</mediawiki>\n");

    std::fs::write(&path, xml).unwrap();
    path
}
