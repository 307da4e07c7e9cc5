use clap::Parser;
use log::{error, info};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use schedule::{write_listing, Catalog, Record};

const DEFAULT_CSV_PATH: &str = "data/STEM - Summer 2022 Schedule of Classes as of 05-02-22.csv";

/// Interactive lookup over a course schedule export
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// The path to the schedule CSV file
    #[arg(default_value = DEFAULT_CSV_PATH)]
    path: PathBuf,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let stdin = io::stdin();
    let result = load_catalog(&args.path, &mut io::stdout())
        .and_then(|catalog| run_menu(&catalog, stdin.lock(), io::stdout()));
    if let Err(err) = result {
        error!("terminal i/o failed: {}", err);
        std::process::exit(1);
    }
}

/// A failed load is reported and leaves an empty catalog behind.
fn load_catalog<W: Write>(path: &std::path::Path, out: &mut W) -> io::Result<Catalog> {
    let mut catalog = Catalog::new();
    let notice = match catalog.load(path) {
        Ok(rows) => {
            info!("{} rows read from '{}'", rows, path.display());
            "Schedule data loaded successfully.".to_string()
        }
        Err(err) if err.is_not_found() => {
            "CSV file not found. Check the file path and name.".to_string()
        }
        Err(err) => format!("CSV file could not be loaded: {}", err),
    };
    writeln!(out, "{}", notice)?;
    Ok(catalog)
}

fn run_menu<R: BufRead, W: Write>(
    catalog: &Catalog,
    mut input: R,
    mut out: W,
) -> io::Result<()> {
    loop {
        writeln!(out, "\n--- COURSE SCHEDULE SYSTEM ---")?;
        writeln!(out, "1. Display all courses")?;
        writeln!(out, "2. Search by subject")?;
        writeln!(out, "3. Search by subject and catalog")?;
        writeln!(out, "4. Search by instructor last name")?;
        writeln!(out, "5. Quit")?;

        let choice = match prompt(&mut input, &mut out, "Enter option (1–5): ")? {
            Some(choice) => choice,
            None => return Ok(()),
        };

        match choice.as_str() {
            "1" => write_listing(&mut out, catalog.all())?,
            "2" => {
                let Some(subject) = prompt(
                    &mut input,
                    &mut out,
                    "Enter subject (e.g., BIO, CHM, MDE): ",
                )?
                else {
                    return Ok(());
                };
                let results = catalog.find_by_subject(&subject.to_uppercase());
                show(&mut out, results, "No courses found for that subject.")?;
            }
            "3" => {
                let Some(subject) = prompt(&mut input, &mut out, "Enter subject (e.g., BIO): ")?
                else {
                    return Ok(());
                };
                let Some(number) = prompt(
                    &mut input,
                    &mut out,
                    "Enter catalog number (e.g., 141): ",
                )?
                else {
                    return Ok(());
                };
                let results = catalog.find_by_subject_catalog(&subject.to_uppercase(), &number);
                show(&mut out, results, "No courses found for that subject/catalog.")?;
            }
            "4" => {
                let Some(last_name) = prompt(
                    &mut input,
                    &mut out,
                    "Enter instructor last name (e.g., Abrahams, Anderson): ",
                )?
                else {
                    return Ok(());
                };
                let results = catalog.find_by_instructor_last_name_prefix(&last_name);
                show(&mut out, results, "No courses found for that instructor.")?;
            }
            "5" => {
                writeln!(out, "Goodbye!")?;
                return Ok(());
            }
            _ => writeln!(out, "Invalid choice, please enter a number from 1 to 5.")?,
        }
    }
}

/// Returns the trimmed answer, or `None` once input is exhausted.
fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    text: &str,
) -> io::Result<Option<String>> {
    write!(out, "{}", text)?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn show<W: Write>(out: &mut W, results: Vec<&Record>, empty: &str) -> io::Result<()> {
    if results.is_empty() {
        writeln!(out, "{}", empty)
    } else {
        write_listing(out, results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add(Record::new("BIO", "141", "D01", "LEC", "1", 4, 20, 24, "Abrahams,Shaheem"));
        catalog.add(Record::new(
            "CHM",
            "151",
            "D01",
            "LAB",
            "1",
            1,
            10,
            12,
            "Anderson Jr.,William Michael",
        ));
        catalog
    }

    fn session(catalog: &Catalog, input: &str) -> String {
        let mut out = Vec::new();
        run_menu(catalog, input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn quit_says_goodbye() {
        let out = session(&catalog(), "5\n");
        assert!(out.ends_with("Goodbye!\n"));
    }

    #[test]
    fn invalid_choice_reprompts() {
        let out = session(&catalog(), "9\nabc\n5\n");
        assert_eq!(out.matches("Invalid choice").count(), 2);
        assert_eq!(out.matches("--- COURSE SCHEDULE SYSTEM ---").count(), 3);
    }

    #[test]
    fn subject_search_is_upper_cased() {
        let out = session(&catalog(), "2\n bio \n5\n");
        assert!(out.contains("Abrahams,Shaheem"));
        assert!(!out.contains("Anderson"));
    }

    #[test]
    fn subject_catalog_search_without_match() {
        let out = session(&catalog(), "3\nbio\n1410\n5\n");
        assert!(out.contains("No courses found for that subject/catalog."));
    }

    #[test]
    fn instructor_prefix_search() {
        let out = session(&catalog(), "4\nand\n5\n");
        assert!(out.contains("Anderson Jr.,William Michael"));
        assert!(!out.contains("Abrahams"));
    }

    #[test]
    fn list_all_prints_header() {
        let out = session(&catalog(), "1\n5\n");
        assert!(out.contains("Subject  Catalog Section"));
        assert!(out.contains("Abrahams,Shaheem"));
        assert!(out.contains("Anderson Jr.,William Michael"));
    }

    #[test]
    fn end_of_input_stops_loop() {
        let out = session(&catalog(), "2\n");
        assert!(!out.contains("Goodbye!"));
    }

    #[test]
    fn missing_file_leaves_empty_catalog() {
        let mut out = Vec::new();
        let catalog = load_catalog(std::path::Path::new("does/not/exist.csv"), &mut out).unwrap();

        assert!(catalog.is_empty());
        assert!(String::from_utf8(out).unwrap().contains("CSV file not found"));
    }

    #[test]
    fn directory_is_reported_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let catalog = load_catalog(dir.path(), &mut out).unwrap();

        assert!(catalog.is_empty());
        assert!(String::from_utf8(out).unwrap().contains("CSV file not found"));
    }
}
