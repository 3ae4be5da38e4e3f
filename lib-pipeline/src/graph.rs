/// The task graph: registration, validation and scheduling.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write;

use crate::errors::*;
use crate::task::Task;

/// All declared tasks, in declaration order.
#[derive(Debug, Default)]
pub struct Pipeline {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; names must be unique.
    pub fn add(&mut self, task: Task) -> Result<()> {
        if self.index.contains_key(&task.name) {
            bail!("Task {} declared twice", task.name);
        }
        self.index.insert(task.name.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    fn lookup(&self, name: &str) -> Result<usize> {
        match self.index.get(name) {
            Some(&i) => Ok(i),
            None => bail!("Unknown task: {}", name),
        }
    }

    /// Check that all predecessors exist and that there are no cycles.
    pub fn validate(&self) -> Result<()> {
        for task in &self.tasks {
            for name in &task.follows {
                self.lookup(name)
                    .chain_err(|| format!("Task {} follows unknown task {}", task.name, name))?;
            }
        }
        let all: Vec<usize> = (0..self.tasks.len()).collect();
        self.order(&all).map(|_| ())
    }

    /// Topological order of the tasks in `subset`, ties broken by declaration order.
    ///
    /// Predecessors outside of `subset` are ignored.
    fn order(&self, subset: &[usize]) -> Result<Vec<usize>> {
        let members: HashSet<usize> = subset.iter().cloned().collect();
        let mut in_degree: HashMap<usize, usize> = HashMap::new();
        let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
        for &i in subset {
            let preds: BTreeSet<usize> = self.tasks[i]
                .follows
                .iter()
                .filter_map(|name| self.index.get(name).cloned())
                .filter(|p| members.contains(p))
                .collect();
            in_degree.insert(i, preds.len());
            for p in preds {
                successors.entry(p).or_insert_with(Vec::new).push(i);
            }
        }

        let mut ready: BTreeSet<usize> = subset
            .iter()
            .cloned()
            .filter(|i| in_degree[i] == 0)
            .collect();
        let mut result = Vec::with_capacity(subset.len());
        loop {
            let i = match ready.iter().next() {
                Some(&i) => i,
                None => break,
            };
            ready.remove(&i);
            result.push(i);
            for s in successors.get(&i).cloned().unwrap_or_default() {
                if let Some(degree) = in_degree.get_mut(&s) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(s);
                    }
                }
            }
        }

        if result.len() != subset.len() {
            let stuck: Vec<&str> = subset
                .iter()
                .filter(|i| !result.contains(*i))
                .map(|&i| self.tasks[i].name.as_str())
                .collect();
            bail!("Cycle in task graph involving {}", stuck.join(", "));
        }
        Ok(result)
    }

    /// The `target` task and all of its ancestors, in execution order.
    pub fn schedule(&self, target: &str) -> Result<Vec<&Task>> {
        let mut seen = HashSet::new();
        let mut stack = vec![self.lookup(target)?];
        while let Some(i) = stack.pop() {
            if !seen.insert(i) {
                continue;
            }
            for name in &self.tasks[i].follows {
                stack.push(self.lookup(name).chain_err(|| {
                    format!("Task {} follows unknown task {}", self.tasks[i].name, name)
                })?);
            }
        }

        let mut subset: Vec<usize> = seen.into_iter().collect();
        subset.sort();
        Ok(self
            .order(&subset)?
            .into_iter()
            .map(|i| &self.tasks[i])
            .collect())
    }

    /// Graphviz rendering of the schedule for `target`; inactive tasks are dashed.
    pub fn to_dot(&self, target: &str) -> Result<String> {
        let schedule = self.schedule(target)?;
        let names: HashSet<&str> = schedule.iter().map(|t| t.name.as_str()).collect();

        let mut out = String::new();
        writeln!(out, "digraph \"{}\" {{", target).chain_err(|| "Formatting failed")?;
        for task in &schedule {
            let style = if task.active { "solid" } else { "dashed" };
            writeln!(out, "  \"{}\" [style={}];", task.name, style)
                .chain_err(|| "Formatting failed")?;
        }
        for task in &schedule {
            for pred in task.follows.iter().filter(|p| names.contains(p.as_str())) {
                writeln!(out, "  \"{}\" -> \"{}\";", pred, task.name)
                    .chain_err(|| "Formatting failed")?;
            }
        }
        out.push_str("}\n");
        Ok(out)
    }
}
